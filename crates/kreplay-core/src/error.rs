use std::path::PathBuf;

use thiserror::Error;

use crate::cluster::ObjectKind;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid trace: {0}")]
    Trace(String),

    #[error("units are not ordered by submission offset: '{unit}' at {offset:?} follows {previous:?}")]
    SubmissionOrder {
        unit: String,
        offset: std::time::Duration,
        previous: std::time::Duration,
    },

    #[error("unfinished unit count went negative in epoch {epoch} (double-counted completion of '{unit}')")]
    NegativeUnfinished { epoch: u32, unit: String },

    #[error("failed to {op} {kind}: {message}")]
    Reclaim {
        op: &'static str,
        kind: ObjectKind,
        message: String,
    },

    #[error("{kind} still present after {attempts} delete attempt(s) ({remaining} left)")]
    ReclaimExhausted {
        kind: ObjectKind,
        attempts: u32,
        remaining: usize,
    },

    #[error("cannot write output {path}: {message}")]
    Output { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ReplayError>;
