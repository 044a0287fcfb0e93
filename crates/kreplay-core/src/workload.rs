//! Batsim workload files and their translation into submittable units.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::error::{ReplayError, Result};
use crate::naming::validate_unit_id;
use crate::unit::{SubmittableUnit, WorkSpec};

/// Profile type that maps to a sleeping container.
pub const DELAY_PROFILE: &str = "delay";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    #[serde(alias = "resourceCount", default = "default_nb_res")]
    pub nb_res: u32,
    pub jobs: Vec<TraceJob>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceJob {
    #[serde(deserialize_with = "deserialize_job_id")]
    pub id: String,
    /// Submission time in seconds.
    pub subtime: f64,
    #[serde(default = "default_res")]
    pub res: u32,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    /// Simulator-only keys (`ret`, ...) kept for round-tripping.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_nb_res() -> u32 {
    1
}

fn default_res() -> u32 {
    1
}

fn deserialize_job_id<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "job id must be a string or a number, got {other}"
        ))),
    }
}

impl Workload {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::Trace(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| ReplayError::Trace(e.to_string()))
    }
}

/// Options the translator needs beyond the workload itself.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub image: String,
}

/// Turn every trace job into a [`SubmittableUnit`], in trace order.
///
/// Does not sort; ordering is checked by
/// [`verify_submission_order`](crate::unit::verify_submission_order).
/// Job ids must be unique, since each one names exactly one subject per epoch.
pub fn translate(workload: &Workload, opts: &TranslateOptions) -> Result<Vec<SubmittableUnit>> {
    let mut seen = HashSet::new();
    workload
        .jobs
        .iter()
        .map(|job| {
            if !seen.insert(job.id.as_str()) {
                return Err(ReplayError::Trace(format!(
                    "job id '{}' appears more than once",
                    job.id
                )));
            }
            translate_job(job, workload, opts)
        })
        .collect()
}

fn translate_job(job: &TraceJob, wl: &Workload, opts: &TranslateOptions) -> Result<SubmittableUnit> {
    validate_unit_id(&job.id)?;
    let profile = wl.profiles.get(&job.profile).ok_or_else(|| {
        ReplayError::Trace(format!(
            "job '{}' references unknown profile '{}'",
            job.id, job.profile
        ))
    })?;
    if profile.kind != DELAY_PROFILE {
        return Err(ReplayError::Trace(format!(
            "profile '{}' has unsupported type '{}' (only '{DELAY_PROFILE}' runs on a cluster)",
            job.profile, profile.kind
        )));
    }
    let delay = profile
        .delay
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| {
            ReplayError::Trace(format!(
                "profile '{}' needs a non-negative 'delay'",
                job.profile
            ))
        })?;
    let submission_offset = Duration::try_from_secs_f64(job.subtime).map_err(|_| {
        ReplayError::Trace(format!(
            "job '{}' has invalid subtime {}",
            job.id, job.subtime
        ))
    })?;

    Ok(SubmittableUnit {
        id: job.id.clone(),
        submission_offset,
        profile: job.profile.clone(),
        requested_resources: job.res,
        spec: WorkSpec {
            image: opts.image.clone(),
            command: vec!["sleep".to_string(), delay.to_string()],
            cpu_millis: profile.cpu.map(cpu_to_millis),
            scheduler_name: profile
                .scheduler
                .clone()
                .filter(|s| !s.is_empty() && s != "default"),
        },
    })
}

fn cpu_to_millis(cpu: f64) -> u32 {
    ((cpu * 1000.0).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r#"{
        "nb_res": 1,
        "jobs": [
            {"id": 1, "subtime": 0, "res": 1, "profile": "delay10"},
            {"id": "2", "subtime": 2.5, "profile": "delay10"}
        ],
        "profiles": {
            "delay10": {"type": "delay", "delay": 10, "cpu": 0.25, "scheduler": "default", "ret": 1}
        }
    }"#;

    fn opts() -> TranslateOptions {
        TranslateOptions {
            image: "busybox".into(),
        }
    }

    #[test]
    fn parses_numeric_and_string_ids() {
        let wl = Workload::parse(TRACE).unwrap();
        assert_eq!(wl.jobs[0].id, "1");
        assert_eq!(wl.jobs[1].id, "2");
        assert_eq!(wl.jobs[1].res, 1);
        assert_eq!(wl.profiles["delay10"].extra["ret"], serde_json::json!(1));
    }

    #[test]
    fn translates_delay_profiles() {
        let wl = Workload::parse(TRACE).unwrap();
        let units = translate(&wl, &opts()).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].submission_offset, Duration::from_millis(2500));
        assert_eq!(units[0].spec.command, vec!["sleep", "10"]);
        assert_eq!(units[0].spec.cpu_millis, Some(250));
        assert_eq!(units[0].spec.scheduler_name, None);
        assert_eq!(units[0].profile, "delay10");
    }

    #[test]
    fn resource_count_alias_is_accepted() {
        let wl = Workload::parse(r#"{"resourceCount": 4, "jobs": []}"#).unwrap();
        assert_eq!(wl.nb_res, 4);
    }

    #[test]
    fn unknown_profile_is_a_trace_error() {
        let wl = Workload::parse(
            r#"{"jobs": [{"id": "1", "subtime": 0, "profile": "nope"}], "profiles": {}}"#,
        )
        .unwrap();
        let err = translate(&wl, &opts()).unwrap_err();
        assert!(err.to_string().contains("unknown profile"), "{err}");
    }

    #[test]
    fn non_delay_profile_is_rejected() {
        let wl = Workload::parse(
            r#"{"jobs": [{"id": "1", "subtime": 0, "profile": "p"}],
                "profiles": {"p": {"type": "parallel_homogeneous", "cpu": 1e9}}}"#,
        )
        .unwrap();
        assert!(matches!(translate(&wl, &opts()), Err(ReplayError::Trace(_))));
    }

    #[test]
    fn negative_subtime_is_rejected() {
        let wl = Workload::parse(
            r#"{"jobs": [{"id": "1", "subtime": -1, "profile": "p"}],
                "profiles": {"p": {"type": "delay", "delay": 1}}}"#,
        )
        .unwrap();
        assert!(translate(&wl, &opts()).is_err());
    }

    #[test]
    fn repeated_job_id_is_a_trace_error() {
        let wl = Workload::parse(
            r#"{"jobs": [
                    {"id": 1, "subtime": 0, "profile": "p"},
                    {"id": "2", "subtime": 1, "profile": "p"},
                    {"id": "1", "subtime": 2, "profile": "p"}
                ],
                "profiles": {"p": {"type": "delay", "delay": 1}}}"#,
        )
        .unwrap();
        let err = translate(&wl, &opts()).unwrap_err();
        assert!(matches!(err, ReplayError::Trace(_)));
        assert!(err.to_string().contains("'1' appears more than once"), "{err}");
    }

    #[test]
    fn malformed_json_is_a_trace_error() {
        assert!(matches!(Workload::parse("{"), Err(ReplayError::Trace(_))));
    }

    #[test]
    fn tiny_cpu_request_rounds_up_to_one_millicore() {
        assert_eq!(cpu_to_millis(0.0001), 1);
        assert_eq!(cpu_to_millis(1.5), 1500);
    }
}
