//! The multi-epoch controller.
//!
//! Each epoch walks `Cleaning -> Initializing -> Running -> Finalizing ->
//! Persisted`. Epochs never overlap: the cluster's notification namespace
//! is shared by all of them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::info;

use crate::cluster::Cluster;
use crate::config::ReplayConfig;
use crate::context::EpochContext;
use crate::correlate::{CorrelationSummary, Correlator};
use crate::error::{ReplayError, Result};
use crate::metrics;
use crate::naming::Naming;
use crate::output::{self, OutputPrefix};
use crate::reclaim;
use crate::submit;
use crate::timeline::TimelineTable;
use crate::unit::{verify_submission_order, SubmittableUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochPhase {
    Cleaning,
    Initializing,
    Running,
    Finalizing,
    Persisted,
}

impl fmt::Display for EpochPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EpochPhase::Cleaning => "cleaning",
            EpochPhase::Initializing => "initializing",
            EpochPhase::Running => "running",
            EpochPhase::Finalizing => "finalizing",
            EpochPhase::Persisted => "persisted",
        })
    }
}

/// Result of one persisted epoch.
#[derive(Debug, Clone)]
pub struct EpochOutcome {
    pub index: u32,
    pub path: PathBuf,
    pub rows: usize,
    /// Rows whose derived metrics could be computed.
    pub finalized: usize,
    pub summary: CorrelationSummary,
    /// Wall time of the Running phase.
    pub elapsed: Duration,
}

pub struct Experiment<C: Cluster> {
    cluster: Arc<C>,
    units: Arc<[SubmittableUnit]>,
    config: ReplayConfig,
    output: OutputPrefix,
    epochs: u32,
}

impl<C: Cluster> Experiment<C> {
    /// Fails before touching the cluster if `units` is not ordered by
    /// submission offset.
    pub fn new(
        cluster: Arc<C>,
        units: Vec<SubmittableUnit>,
        config: ReplayConfig,
        output: OutputPrefix,
        epochs: u32,
    ) -> Result<Self> {
        verify_submission_order(&units)?;
        Ok(Self {
            cluster,
            units: units.into(),
            config,
            output,
            epochs,
        })
    }

    pub fn epochs(&self) -> u32 {
        self.epochs
    }

    /// Run every epoch in sequence. Stops at the first fatal error; files of
    /// epochs persisted before it stay on disk.
    pub async fn run(&self) -> Result<Vec<EpochOutcome>> {
        let naming = Naming::new(self.config.workload_tag.clone(), self.epochs);
        let mut outcomes = Vec::with_capacity(self.epochs as usize);
        for index in 0..self.epochs {
            info!(
                epoch = index,
                of = self.epochs,
                units = self.units.len(),
                "======== epoch {index} ========"
            );
            outcomes.push(self.run_epoch(index, naming.clone()).await?);
        }
        Ok(outcomes)
    }

    async fn run_epoch(&self, index: u32, naming: Naming) -> Result<EpochOutcome> {
        phase(index, EpochPhase::Cleaning);
        reclaim::reclaim(
            self.cluster.as_ref(),
            &self.config.reclaim,
            self.config.stabilize(),
        )
        .await?;

        phase(index, EpochPhase::Initializing);
        let table = TimelineTable::new(&self.units, &self.config.workload_tag);
        let events = self.cluster.lifecycle_events();
        let statuses = self.cluster.status_updates();
        let ctx = Arc::new(EpochContext::new(index, Instant::now(), naming, table));

        phase(index, EpochPhase::Running);
        let (done_tx, done_rx) = oneshot::channel();
        let correlator = Correlator::new(
            Arc::clone(&self.cluster),
            Arc::clone(&ctx),
            self.config.completion_timeout(),
        );
        let submission = async {
            submit::run(
                Arc::clone(&self.cluster),
                Arc::clone(&self.units),
                Arc::clone(&ctx),
                done_tx,
            )
            .await;
            Ok::<_, ReplayError>(())
        };
        let ((), summary) =
            tokio::try_join!(submission, correlator.run(done_rx, events, statuses))?;
        let elapsed = ctx.origin.elapsed();

        phase(index, EpochPhase::Finalizing);
        let finalized = metrics::finalize(&ctx.table);
        let path = self.output.epoch_path(index);
        output::write_table(&path, &ctx.table)?;
        info!(epoch = index, path = %path.display(), rows = ctx.table.len(), "timeline written");

        phase(index, EpochPhase::Persisted);
        Ok(EpochOutcome {
            index,
            path,
            rows: ctx.table.len(),
            finalized,
            summary,
            elapsed,
        })
    }
}

fn phase(epoch: u32, phase: EpochPhase) {
    info!(epoch, %phase, "epoch phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCluster;
    use crate::unit::test_unit;

    #[test]
    fn unsorted_units_are_rejected_up_front() {
        let cluster = Arc::new(FakeCluster::default());
        let result = Experiment::new(
            Arc::clone(&cluster),
            vec![test_unit("2", 5.0), test_unit("1", 0.0)],
            ReplayConfig::default(),
            OutputPrefix::parse("out/"),
            1,
        );
        assert!(matches!(result, Err(ReplayError::SubmissionOrder { .. })));
        assert!(cluster.created_names().is_empty());
        assert!(cluster.deletes.lock().unwrap().is_empty());
    }

    #[test]
    fn phases_render_lowercase() {
        assert_eq!(EpochPhase::Cleaning.to_string(), "cleaning");
        assert_eq!(EpochPhase::Persisted.to_string(), "persisted");
    }
}
