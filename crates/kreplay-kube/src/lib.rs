//! Kubernetes backend for `kreplay-core`.
//!
//! Units become `batch/v1` Jobs; lifecycle notifications come from a watch
//! on `core/v1` Events and completions from a watch on the Jobs themselves.

pub mod cluster;
pub mod error;
pub mod job;
pub mod notify;

pub use cluster::KubeCluster;
pub use error::{KubeClusterError, Result};
