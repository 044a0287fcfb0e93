//! `kreplay-core` replays a timestamped job trace against a live cluster
//! and reconstructs, per unit and per epoch, when it was submitted,
//! scheduled, pulled, started and finished.
//!
//! ```text
//! Workload (JSON) ──translate──▶ [SubmittableUnit]
//!                                      │
//!   Experiment::run, for each epoch:   ▼
//!     reclaim ─▶ submit::run ║ Correlator::run ─▶ metrics::finalize ─▶ CSV
//!                     │              ▲
//!                     ▼              │ lifecycle / status streams
//!                  Cluster (trait) ──┘
//! ```

pub mod cluster;
pub mod config;
pub mod context;
pub mod correlate;
pub mod epoch;
pub mod error;
pub mod metrics;
pub mod naming;
pub mod nodes;
pub mod output;
pub mod reclaim;
pub mod submit;
pub mod swf;
pub mod timeline;
pub mod unit;
pub mod workload;

#[cfg(test)]
mod testing;

pub use cluster::{Cluster, ClusterEvent, LifecycleReason, ObjectKind, StatusUpdate};
pub use config::{ReplayConfig, RetryPolicy};
pub use epoch::{EpochOutcome, EpochPhase, Experiment};
pub use error::{ReplayError, Result};
pub use output::OutputPrefix;
pub use unit::{SubmittableUnit, WorkSpec};
