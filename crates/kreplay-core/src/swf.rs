//! Standard Workload Format (SWF) to Batsim workload conversion.

use std::collections::BTreeMap;

use crate::error::{ReplayError, Result};
use crate::workload::{Profile, TraceJob, Workload, DELAY_PROFILE};

/// Smallest CPU request the cluster accepts (1 millicore).
const MIN_CPU: f64 = 0.001;

#[derive(Debug, Clone, Copy, Default)]
pub struct SwfOptions {
    /// Scale CPU requests into `(0, norm]` relative to the largest one.
    pub normalize: Option<f64>,
    /// Give every profile this CPU request.
    pub uniform: Option<f64>,
    /// Cap every delay at this many seconds.
    pub trim: Option<f64>,
}

pub fn convert(swf: &str, opts: SwfOptions) -> Result<Workload> {
    if opts.normalize.is_some() && opts.uniform.is_some() {
        return Err(ReplayError::Config(
            "normalize and uniform cannot both be set".into(),
        ));
    }

    let mut wl = Workload {
        nb_res: 1,
        jobs: Vec::new(),
        profiles: BTreeMap::new(),
    };
    for (lineno, line) in swf.lines().enumerate() {
        parse_line(line, &mut wl).map_err(|msg| {
            ReplayError::Trace(format!("swf line {}: {msg}", lineno + 1))
        })?;
    }

    let Some(first) = wl.jobs.first() else {
        return Err(ReplayError::Trace("this workload has no jobs".into()));
    };
    let origin = first.subtime;
    for job in &mut wl.jobs {
        job.subtime -= origin;
    }

    let max_cpu = wl
        .profiles
        .values()
        .filter_map(|p| p.cpu)
        .fold(0.0_f64, f64::max);
    for profile in wl.profiles.values_mut() {
        let mut cpu = profile.cpu.unwrap_or(MIN_CPU);
        if let Some(norm) = opts.normalize.filter(|n| *n > 0.0) {
            if max_cpu > 0.0 {
                cpu = norm * cpu / max_cpu;
            }
        } else if let Some(uniform) = opts.uniform.filter(|u| *u > 0.0) {
            cpu = uniform;
        }
        profile.cpu = Some((cpu.max(MIN_CPU) * 1000.0).round() / 1000.0);

        if let (Some(trim), Some(delay)) = (opts.trim.filter(|t| *t > 0.0), profile.delay) {
            if delay > trim {
                profile.delay = Some(trim);
            }
        }
    }
    Ok(wl)
}

fn parse_line(line: &str, wl: &mut Workload) -> std::result::Result<(), String> {
    if line.is_empty() || line.starts_with(';') {
        return Ok(());
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return Ok(());
    }
    if fields.len() < 5 {
        return Err(format!("expected at least 5 fields, found {}", fields.len()));
    }
    let number = |idx: usize, what: &str| {
        fields[idx]
            .parse::<f64>()
            .map_err(|e| format!("bad {what} '{}': {e}", fields[idx]))
    };

    let run_time = number(3, "run time")?;
    if run_time == 0.0 {
        return Ok(());
    }
    let subtime = number(1, "submit time")?;
    let cpu = number(4, "processor count")?;

    let profile_name = format!("delay{}", run_time as i64);
    wl.profiles
        .entry(profile_name.clone())
        .or_insert_with(|| Profile {
            kind: DELAY_PROFILE.to_string(),
            delay: Some(run_time),
            cpu: Some(cpu),
            scheduler: Some("default".to_string()),
            extra: BTreeMap::new(),
        });
    wl.jobs.push(TraceJob {
        id: fields[0].to_string(),
        subtime,
        res: 1,
        profile: profile_name,
    });
    Ok(())
}
