//! The seam between the replay core and the cluster it drives.

use std::fmt;
use std::future::Future;

use futures::stream::BoxStream;

use crate::timeline::Column;
use crate::unit::WorkSpec;

/// Reason tag carried by a lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleReason {
    Scheduled,
    Pulling,
    Pulled,
    Created,
    Started,
    Other(String),
}

impl LifecycleReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "Scheduled" => Self::Scheduled,
            "Pulling" => Self::Pulling,
            "Pulled" => Self::Pulled,
            "Created" => Self::Created,
            "Started" => Self::Started,
            other => Self::Other(other.to_string()),
        }
    }

    /// Timestamp column written when this reason is observed.
    pub fn column(&self) -> Option<Column> {
        match self {
            Self::Scheduled => Some(Column::ScheduledTime),
            Self::Pulling => Some(Column::PullingTime),
            Self::Pulled => Some(Column::PulledTime),
            Self::Created => Some(Column::CreatedTime),
            Self::Started => Some(Column::StartingTime),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEvent {
    pub reason: LifecycleReason,
    pub subject_name: String,
    pub namespace: String,
}

/// Status of a managed job as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub object_name: String,
    pub succeeded: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Jobs,
    Pods,
    Events,
}

impl ObjectKind {
    /// Reclaim order: owners before the objects they spawn.
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Jobs, ObjectKind::Pods, ObjectKind::Events];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectKind::Jobs => "jobs",
            ObjectKind::Pods => "pods",
            ObjectKind::Events => "events",
        })
    }
}

/// A cluster that can run units and report on them.
///
/// All methods act on the experiment namespace the implementation was
/// built for. Notification streams are best-effort: they may repeat or
/// drop items, and are subscribed once per epoch.
pub trait Cluster: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn create(
        &self,
        name: &str,
        spec: &WorkSpec,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Node the named pod was placed on, if it still exists.
    fn placement_of(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    fn count(&self, kind: ObjectKind) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    fn delete_all(&self, kind: ObjectKind) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn lifecycle_events(&self) -> BoxStream<'static, ClusterEvent>;

    fn status_updates(&self) -> BoxStream<'static, StatusUpdate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_covers_tracked_reasons() {
        assert_eq!(LifecycleReason::parse("Started").column(), Some(Column::StartingTime));
        assert_eq!(LifecycleReason::parse("Pulled").column(), Some(Column::PulledTime));
        assert_eq!(
            LifecycleReason::parse("Scheduled").column(),
            Some(Column::ScheduledTime)
        );
        assert_eq!(LifecycleReason::parse("SuccessfulCreate").column(), None);
        assert_eq!(
            LifecycleReason::parse("Completed"),
            LifecycleReason::Other("Completed".into())
        );
    }
}
