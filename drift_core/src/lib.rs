//! Drift Core - Concurrency-Safe Recursive Drift Simulation
//!
//! This library owns the shared drift field and every transaction that
//! mutates it:
//! 1. **Pattern keys**: order-independent keys for unordered glyph sets
//! 2. **Alchemy**: a one-way `unknown -> known` combination registry
//! 3. **Entropy field**: bounded scalars under a clamped random walk
//! 4. **Fracture**: structural redaction of records into anomaly echoes
//! 5. **Coordinator**: fork / collapse / memory wipe / scan / tick behind
//!    one exclusive section, with snapshot export and import

pub mod config;
pub mod coordinator;
pub mod error;
pub mod field;
pub mod fracture;
pub mod glyphs;
pub mod ledger;
pub mod pattern;
pub mod pulse;
pub mod records;
pub mod registry;
pub mod snapshot;

// Re-export key types for convenience
pub use config::DriftConfig;
pub use coordinator::{ActionResult, DriftCoordinator, StatusReport};
pub use error::DriftError;
pub use field::{EntropyField, FluxShift, TickMagnitudes};
pub use fracture::fracture;
pub use glyphs::{Element, ElementalTable};
pub use ledger::{ResourceDelta, ResourceLedger};
pub use pattern::PatternKey;
pub use pulse::{spawn_entropy_pulse, PulseHandle};
pub use records::{AnomalyEcho, DriftMap, OperationKind, OperationPayload, OperationRecord};
pub use registry::{CombinationRecord, CombinationRegistry, Outcome, Rarity, Resolution};
pub use snapshot::{JsonFileStore, Snapshot, SnapshotStore};
