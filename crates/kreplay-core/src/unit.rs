use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};

/// Ready-to-submit description of one container workload.
///
/// The replay core never looks inside; it is handed to [`crate::Cluster::create`]
/// together with the subject name chosen for the current epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSpec {
    pub image: String,
    pub command: Vec<String>,
    /// CPU request in millicores.
    pub cpu_millis: Option<u32>,
    pub scheduler_name: Option<String>,
}

/// One trace entry, translated once and reused read-only by every epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittableUnit {
    pub id: String,
    /// Dispatch time relative to the epoch origin.
    pub submission_offset: Duration,
    pub profile: String,
    pub requested_resources: u32,
    pub spec: WorkSpec,
}

/// Check that `units` is non-decreasing by submission offset.
///
/// Runs before the first epoch; a violation aborts the whole run.
pub fn verify_submission_order(units: &[SubmittableUnit]) -> Result<()> {
    let mut previous = Duration::ZERO;
    for unit in units {
        if unit.submission_offset < previous {
            return Err(ReplayError::SubmissionOrder {
                unit: unit.id.clone(),
                offset: unit.submission_offset,
                previous,
            });
        }
        previous = unit.submission_offset;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_unit(id: &str, offset_secs: f64) -> SubmittableUnit {
    SubmittableUnit {
        id: id.to_string(),
        submission_offset: Duration::from_secs_f64(offset_secs),
        profile: "delay1".into(),
        requested_resources: 1,
        spec: WorkSpec {
            image: "busybox".into(),
            command: vec!["sleep".into(), "1".into()],
            cpu_millis: Some(100),
            scheduler_name: None,
        },
    }
}
