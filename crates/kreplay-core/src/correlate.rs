//! Event correlation: folding cluster notifications back into the timeline.
//!
//! A single dispatch loop selects over the submission report, lifecycle
//! notifications and job status updates. The unfinished counter is only
//! ever touched inside that loop.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cluster::{Cluster, ClusterEvent, LifecycleReason, StatusUpdate};
use crate::context::EpochContext;
use crate::error::{ReplayError, Result};
use crate::naming::Mismatch;
use crate::nodes::NodeRegistry;
use crate::submit::SubmissionReport;
use crate::timeline::{Cell, Column, RowId};

/// Why a notification was not applied to any row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    ForeignTag,
    Malformed,
    StaleEpoch,
    UnknownUnit,
    Duplicate,
    /// Lifecycle event for a row whose completion was already recorded.
    AfterCompletion,
}

impl From<Mismatch> for DropReason {
    fn from(m: Mismatch) -> Self {
        match m {
            Mismatch::ForeignTag => DropReason::ForeignTag,
            Mismatch::Malformed => DropReason::Malformed,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::ForeignTag => "foreign tag",
            DropReason::Malformed => "malformed name",
            DropReason::StaleEpoch => "stale epoch",
            DropReason::UnknownUnit => "unknown unit",
            DropReason::Duplicate => "duplicate completion",
            DropReason::AfterCompletion => "after completion",
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropCounters {
    pub foreign_tag: usize,
    pub malformed: usize,
    pub stale_epoch: usize,
    pub unknown_unit: usize,
    pub duplicate: usize,
    pub after_completion: usize,
}

impl DropCounters {
    fn record(&mut self, reason: DropReason) {
        let slot = match reason {
            DropReason::ForeignTag => &mut self.foreign_tag,
            DropReason::Malformed => &mut self.malformed,
            DropReason::StaleEpoch => &mut self.stale_epoch,
            DropReason::UnknownUnit => &mut self.unknown_unit,
            DropReason::Duplicate => &mut self.duplicate,
            DropReason::AfterCompletion => &mut self.after_completion,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.foreign_tag
            + self.malformed
            + self.stale_epoch
            + self.unknown_unit
            + self.duplicate
            + self.after_completion
    }
}

/// What the correlator saw during one epoch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CorrelationSummary {
    pub completed: usize,
    pub rejected: usize,
    /// Units still outstanding when the loop stopped (timeout or closed stream).
    pub unobserved: usize,
    pub correlated_events: usize,
    pub nodes: usize,
    pub drops: DropCounters,
}

pub struct Correlator<C: Cluster> {
    cluster: Arc<C>,
    ctx: Arc<EpochContext>,
    nodes: NodeRegistry,
    unfinished: usize,
    settled: HashSet<RowId>,
    completion_timeout: Option<Duration>,
    summary: CorrelationSummary,
}

impl<C: Cluster> Correlator<C> {
    pub fn new(
        cluster: Arc<C>,
        ctx: Arc<EpochContext>,
        completion_timeout: Option<Duration>,
    ) -> Self {
        let unfinished = ctx.table.len();
        Self {
            cluster,
            ctx,
            nodes: NodeRegistry::new(),
            unfinished,
            settled: HashSet::new(),
            completion_timeout,
            summary: CorrelationSummary::default(),
        }
    }

    pub fn unfinished(&self) -> usize {
        self.unfinished
    }

    /// Drive the dispatch loop until the submission report has arrived and
    /// no unit is outstanding.
    pub async fn run(
        mut self,
        mut submitted: oneshot::Receiver<SubmissionReport>,
        mut events: BoxStream<'static, ClusterEvent>,
        mut statuses: BoxStream<'static, StatusUpdate>,
    ) -> Result<CorrelationSummary> {
        let mut submission_done = false;
        let mut events_open = true;
        let mut statuses_open = true;
        let mut deadline: Option<Instant> = None;

        while !(submission_done && self.unfinished == 0) {
            if submission_done && !statuses_open {
                warn!(
                    epoch = self.ctx.index,
                    remaining = self.unfinished,
                    "status stream closed, giving up on outstanding completions"
                );
                break;
            }

            tokio::select! {
                report = &mut submitted, if !submission_done => {
                    submission_done = true;
                    match report {
                        Ok(report) => self.on_submission_report(report)?,
                        Err(_) => warn!(epoch = self.ctx.index, "submission task ended without a report"),
                    }
                    deadline = self.completion_timeout.map(|t| Instant::now() + t);
                }
                event = events.next(), if events_open => match event {
                    Some(event) => self.on_lifecycle(event).await,
                    None => {
                        warn!(epoch = self.ctx.index, "lifecycle stream closed");
                        events_open = false;
                    }
                },
                update = statuses.next(), if statuses_open => match update {
                    Some(update) => self.on_status(update)?,
                    None => {
                        warn!(epoch = self.ctx.index, "status stream closed");
                        statuses_open = false;
                    }
                },
                _ = sleep_until_opt(deadline) => {
                    warn!(
                        epoch = self.ctx.index,
                        remaining = self.unfinished,
                        "completion timeout reached"
                    );
                    break;
                }
            }
        }

        self.summary.unobserved = self.unfinished;
        self.summary.nodes = self.nodes.len();
        let d = self.summary.drops;
        info!(
            epoch = self.ctx.index,
            completed = self.summary.completed,
            correlated = self.summary.correlated_events,
            foreign_tag = d.foreign_tag,
            malformed = d.malformed,
            stale_epoch = d.stale_epoch,
            unknown_unit = d.unknown_unit,
            duplicate = d.duplicate,
            after_completion = d.after_completion,
            "correlation finished"
        );
        Ok(self.summary)
    }

    fn on_submission_report(&mut self, report: SubmissionReport) -> Result<()> {
        for id in &report.failed {
            let Some(row) = self.ctx.table.lookup_row(id) else {
                continue;
            };
            if self.settled.insert(row) {
                self.decrement(id)?;
                self.summary.rejected += 1;
            }
        }
        Ok(())
    }

    fn on_status(&mut self, update: StatusUpdate) -> Result<()> {
        if update.succeeded != 1 {
            return Ok(());
        }
        let Some((row, unit)) = self.resolve(&update.object_name) else {
            return Ok(());
        };
        if !self.settled.insert(row) {
            self.drop_notification(&update.object_name, DropReason::Duplicate);
            return Ok(());
        }
        self.ctx
            .table
            .write(row, Column::FinishTime, Cell::Seconds(self.ctx.now_secs()));
        self.decrement(&unit)?;
        self.summary.completed += 1;
        info!(
            epoch = self.ctx.index,
            unit = %unit,
            remaining = self.unfinished,
            "job {} completed",
            update.object_name
        );
        Ok(())
    }

    async fn on_lifecycle(&mut self, event: ClusterEvent) {
        let Some(column) = event.reason.column() else {
            return;
        };
        let Some((row, unit)) = self.resolve(&event.subject_name) else {
            return;
        };
        // finish_time stays the last timestamp of a settled row
        if self.settled.contains(&row) {
            self.drop_notification(&event.subject_name, DropReason::AfterCompletion);
            return;
        }
        let at = self.ctx.now_secs();
        debug!(
            epoch = self.ctx.index,
            unit = %unit,
            reason = ?event.reason,
            subject = %event.subject_name,
            at,
            "lifecycle event"
        );
        // first observation wins; repeats of the same event are common
        if !self.ctx.table.write_if_empty(row, column, Cell::Seconds(at)) {
            return;
        }
        self.summary.correlated_events += 1;

        if event.reason == LifecycleReason::Scheduled {
            match self.cluster.placement_of(&event.subject_name).await {
                Ok(Some(node)) => {
                    let id = self.nodes.id_for(&node);
                    self.ctx
                        .table
                        .write(row, Column::AllocatedResources, Cell::Int(id.into()));
                }
                Ok(None) => warn!(
                    subject = %event.subject_name,
                    "scheduled pod vanished before its node could be read"
                ),
                Err(e) => warn!(
                    subject = %event.subject_name,
                    error = %e,
                    "failed to read placement"
                ),
            }
        }
    }

    /// Map a subject name to a row of this epoch's table.
    fn resolve(&mut self, name: &str) -> Option<(RowId, String)> {
        let subject = match self.ctx.naming.parse(name) {
            Ok(subject) => subject,
            Err(m) => {
                self.drop_notification(name, m.into());
                return None;
            }
        };
        if self.ctx.naming.epoch_scoped && subject.epoch != Some(self.ctx.index) {
            self.drop_notification(name, DropReason::StaleEpoch);
            return None;
        }
        match self.ctx.table.lookup_row(&subject.unit_id) {
            Some(row) => Some((row, subject.unit_id)),
            None => {
                self.drop_notification(name, DropReason::UnknownUnit);
                None
            }
        }
    }

    fn drop_notification(&mut self, subject: &str, reason: DropReason) {
        debug!(epoch = self.ctx.index, subject, %reason, "dropped notification");
        self.summary.drops.record(reason);
    }

    fn decrement(&mut self, unit: &str) -> Result<()> {
        self.unfinished = self
            .unfinished
            .checked_sub(1)
            .ok_or_else(|| ReplayError::NegativeUnfinished {
                epoch: self.ctx.index,
                unit: unit.to_string(),
            })?;
        Ok(())
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
