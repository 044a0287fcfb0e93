//! Clearing the experiment namespace between epochs.

use std::time::Duration;

use tracing::{debug, info};

use crate::cluster::{Cluster, ObjectKind};
use crate::config::RetryPolicy;
use crate::error::{ReplayError, Result};

/// Delete every managed object, kind by kind, until a re-list comes back
/// empty.
///
/// Any delete or list failure aborts the run: a leaked object would feed
/// events into the next epoch.
pub async fn reclaim<C: Cluster>(cluster: &C, policy: &RetryPolicy, stabilize: Duration) -> Result<()> {
    if !stabilize.is_zero() {
        info!(
            secs = stabilize.as_secs_f64(),
            "waiting for resources to stabilize before cleaning"
        );
        tokio::time::sleep(stabilize).await;
    }
    for kind in ObjectKind::ALL {
        reclaim_kind(cluster, kind, policy).await?;
    }
    info!("done cleaning resources");
    Ok(())
}

async fn reclaim_kind<C: Cluster>(cluster: &C, kind: ObjectKind, policy: &RetryPolicy) -> Result<()> {
    info!(%kind, "cleaning");
    let mut attempt = 0;
    loop {
        attempt += 1;
        cluster
            .delete_all(kind)
            .await
            .map_err(|e| ReplayError::Reclaim {
                op: "delete",
                kind,
                message: e.to_string(),
            })?;
        tokio::time::sleep(policy.interval(attempt)).await;

        let remaining = cluster.count(kind).await.map_err(|e| ReplayError::Reclaim {
            op: "list",
            kind,
            message: e.to_string(),
        })?;
        if remaining == 0 {
            return Ok(());
        }
        if attempt >= policy.max_attempts {
            return Err(ReplayError::ReclaimExhausted {
                kind,
                attempts: attempt,
                remaining,
            });
        }
        debug!(%kind, remaining, attempt, "objects still present, deleting again");
    }
}
