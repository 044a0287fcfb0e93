//! Watch-driven notification streams.
//!
//! Each subscription starts a watcher on a background task that maps
//! objects into core notifications and forwards them over a bounded
//! channel. Dropping the stream closes the channel and the task exits.

use std::fmt::Debug;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Event;
use kreplay_core::{ClusterEvent, LifecycleReason, StatusUpdate};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

pub struct NotificationStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Send + 'static> NotificationStream<T> {
    /// Watch `api` and forward every object `map` accepts.
    pub fn watch<K>(api: Api<K>, what: &'static str, map: fn(&K) -> Option<T>) -> Self
    where
        K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut objects = watcher(api, watcher::Config::default())
                .default_backoff()
                .applied_objects()
                .boxed();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    next = objects.next() => match next {
                        Some(Ok(obj)) => {
                            let Some(item) = map(&obj) else { continue };
                            if tx.send(item).await.is_err() {
                                break;
                            }
                        }
                        // the backoff keeps the watch alive; just report it
                        Some(Err(e)) => warn!(what, error = %e, "watch error"),
                        None => break,
                    },
                }
            }
            debug!(what, "watch stopped");
        });

        Self { rx }
    }

    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<T>) -> Self {
        Self { rx }
    }
}

impl<T> Stream for NotificationStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Lifecycle notification for the object an Event is about.
pub fn lifecycle_from_event(event: &Event) -> Option<ClusterEvent> {
    let reason = event.reason.as_deref()?;
    let subject_name = event.involved_object.name.clone()?;
    let namespace = event
        .involved_object
        .namespace
        .clone()
        .or_else(|| event.metadata.namespace.clone())
        .unwrap_or_default();
    Some(ClusterEvent {
        reason: LifecycleReason::parse(reason),
        subject_name,
        namespace,
    })
}

pub fn status_from_job(job: &Job) -> Option<StatusUpdate> {
    let object_name = job.metadata.name.clone()?;
    let succeeded = job
        .status
        .as_ref()
        .and_then(|s| s.succeeded)
        .unwrap_or(0);
    Some(StatusUpdate {
        object_name,
        succeeded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::JobStatus;
    use k8s_openapi::api::core::v1::ObjectReference;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn event(reason: Option<&str>, name: Option<&str>) -> Event {
        Event {
            metadata: ObjectMeta {
                name: Some("w0-1-7-abcde.17a2".into()),
                namespace: Some("experiments".into()),
                ..Default::default()
            },
            reason: reason.map(str::to_string),
            involved_object: ObjectReference {
                kind: Some("Pod".into()),
                name: name.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn event_maps_to_lifecycle_notification() {
        let mapped = lifecycle_from_event(&event(Some("Pulled"), Some("w0-1-7-abcde"))).unwrap();
        assert_eq!(mapped.reason, LifecycleReason::Pulled);
        assert_eq!(mapped.subject_name, "w0-1-7-abcde");
        assert_eq!(mapped.namespace, "experiments");
    }

    #[test]
    fn unknown_reason_is_kept_as_other() {
        let mapped = lifecycle_from_event(&event(Some("BackOff"), Some("w0-7"))).unwrap();
        assert_eq!(mapped.reason, LifecycleReason::Other("BackOff".into()));
        assert!(mapped.reason.column().is_none());
    }

    #[test]
    fn events_without_reason_or_subject_are_skipped() {
        assert!(lifecycle_from_event(&event(None, Some("w0-7"))).is_none());
        assert!(lifecycle_from_event(&event(Some("Started"), None)).is_none());
    }

    #[test]
    fn job_status_maps_succeeded_count() {
        let mut job = Job {
            metadata: ObjectMeta {
                name: Some("w0-2-9".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(status_from_job(&job).unwrap().succeeded, 0);

        job.status = Some(JobStatus {
            succeeded: Some(1),
            ..Default::default()
        });
        let update = status_from_job(&job).unwrap();
        assert_eq!(update.object_name, "w0-2-9");
        assert_eq!(update.succeeded, 1);
    }

    #[tokio::test]
    async fn stream_yields_forwarded_items_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = NotificationStream::from_channel(rx);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        drop(tx);
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, None);
    }
}
