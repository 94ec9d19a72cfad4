//! Drift Scenario Harness
//!
//! Seeded scenarios that drive a [`drift_core::DriftCoordinator`] through
//! many lifecycle sequences and check the coordinator's guarantees after
//! every step:
//! - field scalars stay inside their ranges
//! - memory wipes credit exactly twice the erased history
//! - discovery odds follow elemental resonance
//! - concurrent timers and callers never lose a ledger update
//! - snapshots survive the file store unchanged
//!
//! Every random stream is derived from the scenario seed through
//! [`drift_env::SimContext`], so a failing seed can be rerun exactly.
//!
//! # Usage
//!
//! ```ignore
//! use drift_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::WipeAccounting);
//! assert!(result.passed);
//! ```

pub mod runner;
pub mod scenarios;

pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
