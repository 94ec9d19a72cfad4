//! Drift Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the drift engine
//! to run in both **Production** (tokio, OS entropy) and **Simulation**
//! (virtual clock, seeded streams) environments.
//!
//! # Core Concept: Injected Entropy
//!
//! The drift field is probabilistic by nature, but every source of
//! non-determinism is routed through a [`DriftContext`]:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Background work (`spawn()`)
//! - Randomness (`entropy_source()`)
//!
//! Production draws from the OS; simulation derives every stream from a
//! single 64-bit seed so statistical checks can be replayed by seed number.
//!
//! # Example
//!
//! ```ignore
//! use drift_env::{DriftContext, SimContext};
//!
//! let ctx = SimContext::shared(42);
//! let mut rng = ctx.entropy_source(0);
//! let roll: f64 = rand::Rng::gen(&mut rng);
//! ```

mod context;
mod sim_impl;
mod tokio_impl;

pub use context::DriftContext;
pub use sim_impl::SimContext;
pub use tokio_impl::TokioContext;
