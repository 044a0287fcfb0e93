//! Timed submission of units against the epoch origin.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cluster::Cluster;
use crate::context::EpochContext;
use crate::timeline::{Cell, Column};
use crate::unit::SubmittableUnit;

/// Outcome of the submission phase, handed to the correlator exactly once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub submitted: usize,
    /// Ids of units the cluster refused.
    pub failed: Vec<String>,
}

/// Submit every unit at `origin + submission_offset`.
///
/// Waits only for each unit's own deadline; creates whose deadlines have
/// passed run concurrently. Once every create has returned, the report is
/// sent on `done`.
pub async fn run<C: Cluster>(
    cluster: Arc<C>,
    units: Arc<[SubmittableUnit]>,
    ctx: Arc<EpochContext>,
    done: oneshot::Sender<SubmissionReport>,
) {
    let mut inflight = JoinSet::new();
    for unit in units.iter() {
        tokio::time::sleep_until(ctx.origin + unit.submission_offset).await;

        let cluster = Arc::clone(&cluster);
        let ctx = Arc::clone(&ctx);
        let unit = unit.clone();
        inflight.spawn(async move {
            let ok = submit_one(cluster.as_ref(), &ctx, &unit).await;
            (unit.id, ok)
        });
    }

    let mut report = SubmissionReport::default();
    while let Some(joined) = inflight.join_next().await {
        match joined {
            Ok((_, true)) => report.submitted += 1,
            Ok((id, false)) => report.failed.push(id),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {}
        }
    }
    info!(
        epoch = ctx.index,
        submitted = report.submitted,
        failed = report.failed.len(),
        "submission phase complete"
    );
    // The receiver is gone only if the correlator already failed.
    let _ = done.send(report);
}

async fn submit_one<C: Cluster>(cluster: &C, ctx: &EpochContext, unit: &SubmittableUnit) -> bool {
    let name = ctx.subject_name(&unit.id);
    // Stamped at dispatch so it can never trail the cluster's own events.
    let dispatched = Instant::now();
    match cluster.create(&name, &unit.spec).await {
        Ok(()) => {
            let at = ctx.seconds_at(dispatched);
            if let Some(row) = ctx.table.lookup_row(&unit.id) {
                ctx.table.write(row, Column::SubmissionTime, Cell::Seconds(at));
            }
            info!(epoch = ctx.index, unit = %unit.id, at, "job {name} submitted");
            true
        }
        Err(e) => {
            warn!(epoch = ctx.index, unit = %unit.id, error = %e, "submission of {name} failed");
            false
        }
    }
}
