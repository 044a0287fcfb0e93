//! Subject naming convention shared by submission and correlation.
//!
//! Every object created for a unit is named `<tag>-<epoch>-<unit>` (or
//! `<tag>-<unit>` when the run has a single epoch). Pods spawned by a job
//! append their own `-<suffix>`, so parsing tolerates trailing segments.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ReplayError, Result};

static UNIT_ID_RE: OnceLock<Regex> = OnceLock::new();

fn unit_id_re() -> &'static Regex {
    UNIT_ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+$").unwrap())
}

/// Unit ids become a dash-delimited name segment, so they must be
/// lowercase alphanumeric with no `-`.
pub fn validate_unit_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 40 || !unit_id_re().is_match(id) {
        return Err(ReplayError::Trace(format!(
            "job id '{id}' must be 1-40 lowercase alphanumeric characters"
        )));
    }
    Ok(())
}

/// How names are built for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub tag: String,
    /// `false` in single-epoch mode: the epoch segment is omitted.
    pub epoch_scoped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectName {
    pub epoch: Option<u32>,
    pub unit_id: String,
}

/// Why a subject name was not attributed to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mismatch {
    ForeignTag,
    Malformed,
}

impl Naming {
    pub fn new(tag: impl Into<String>, epochs: u32) -> Self {
        Self {
            tag: tag.into(),
            epoch_scoped: epochs > 1,
        }
    }

    pub fn render(&self, epoch: u32, unit_id: &str) -> String {
        if self.epoch_scoped {
            format!("{}-{epoch}-{unit_id}", self.tag)
        } else {
            format!("{}-{unit_id}", self.tag)
        }
    }

    pub fn parse(&self, name: &str) -> std::result::Result<SubjectName, Mismatch> {
        let mut parts = name.split('-');
        if parts.next() != Some(self.tag.as_str()) {
            return Err(Mismatch::ForeignTag);
        }
        let epoch = if self.epoch_scoped {
            let seg = parts.next().ok_or(Mismatch::Malformed)?;
            Some(seg.parse::<u32>().map_err(|_| Mismatch::Malformed)?)
        } else {
            None
        };
        match parts.next() {
            Some(id) if !id.is_empty() => Ok(SubjectName {
                epoch,
                unit_id: id.to_string(),
            }),
            _ => Err(Mismatch::Malformed),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::ForeignTag => write!(f, "foreign tag"),
            Mismatch::Malformed => write!(f, "malformed name"),
        }
    }
}
