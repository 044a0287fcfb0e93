use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded delete/settle/re-list policy used when reclaiming the namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_max_interval_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            max_attempts: default_max_attempts(),
            backoff_factor: default_backoff_factor(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

impl RetryPolicy {
    /// Settle interval after the `attempt`-th delete (1-based).
    pub fn interval(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let ms = self.settle_ms as f64 * self.backoff_factor.powi(exp);
        Duration::from_millis(ms.min(self.max_interval_ms as f64) as u64)
    }
}

// ---------------------------------------------------------------------------
// ReplayConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_workload_tag")]
    pub workload_tag: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_stabilize_secs")]
    pub stabilize_secs: u64,
    #[serde(default)]
    pub reclaim: RetryPolicy,
    /// Stop waiting for completions this long after the last submission.
    /// Absent means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timeout_secs: Option<u64>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_workload_tag() -> String {
    "w0".to_string()
}

fn default_image() -> String {
    "busybox".to_string()
}

fn default_stabilize_secs() -> u64 {
    10
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            workload_tag: default_workload_tag(),
            image: default_image(),
            stabilize_secs: default_stabilize_secs(),
            reclaim: RetryPolicy::default(),
            completion_timeout_secs: None,
        }
    }
}

impl ReplayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: ReplayConfig = if data.trim().is_empty() {
            ReplayConfig::default()
        } else {
            serde_yaml::from_str(&data)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        crate::naming::validate_unit_id(&self.workload_tag).map_err(|_| {
            ReplayError::Config(format!(
                "workload_tag '{}' must be lowercase alphanumeric",
                self.workload_tag
            ))
        })?;
        if self.reclaim.max_attempts == 0 {
            return Err(ReplayError::Config("reclaim.max_attempts must be at least 1".into()));
        }
        if self.reclaim.backoff_factor.is_nan() || self.reclaim.backoff_factor < 1.0 {
            return Err(ReplayError::Config("reclaim.backoff_factor must be >= 1".into()));
        }
        Ok(())
    }

    pub fn stabilize(&self) -> Duration {
        Duration::from_secs(self.stabilize_secs)
    }

    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.yaml");
        std::fs::write(&path, "").unwrap();
        let cfg = ReplayConfig::load(&path).unwrap();
        assert_eq!(cfg, ReplayConfig::default());
        assert_eq!(cfg.namespace, "default");
        assert_eq!(cfg.completion_timeout(), None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.yaml");
        std::fs::write(
            &path,
            "namespace: experiments\nreclaim:\n  max_attempts: 3\ncompletion_timeout_secs: 600\n",
        )
        .unwrap();
        let cfg = ReplayConfig::load(&path).unwrap();
        assert_eq!(cfg.namespace, "experiments");
        assert_eq!(cfg.reclaim.max_attempts, 3);
        assert_eq!(cfg.reclaim.settle_ms, 1000);
        assert_eq!(cfg.completion_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn bad_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.yaml");
        std::fs::write(&path, "workload_tag: w-0\n").unwrap();
        assert!(matches!(
            ReplayConfig::load(&path),
            Err(ReplayError::Config(_))
        ));
    }

    #[test]
    fn retry_interval_backs_off_and_caps() {
        let policy = RetryPolicy {
            settle_ms: 1000,
            max_attempts: 10,
            backoff_factor: 2.0,
            max_interval_ms: 5000,
        };
        assert_eq!(policy.interval(1), Duration::from_secs(1));
        assert_eq!(policy.interval(2), Duration::from_secs(2));
        assert_eq!(policy.interval(3), Duration::from_secs(4));
        assert_eq!(policy.interval(4), Duration::from_secs(5));
    }
}
