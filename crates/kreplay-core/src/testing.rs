//! In-memory [`Cluster`] for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use futures::stream::{self, BoxStream, StreamExt};

use crate::cluster::{Cluster, ClusterEvent, ObjectKind, StatusUpdate};
use crate::unit::WorkSpec;

#[derive(Debug, thiserror::Error)]
#[error("fake cluster: {0}")]
pub struct FakeError(pub String);

#[derive(Debug, Default)]
pub struct FakeCluster {
    pub created: Mutex<Vec<(String, tokio::time::Instant)>>,
    refuse: HashSet<String>,
    placements: HashMap<String, String>,
    /// Successive `count` answers per kind; empty means 0.
    counts: Mutex<HashMap<ObjectKind, VecDeque<usize>>>,
    pub deletes: Mutex<Vec<ObjectKind>>,
    fail_delete: Option<ObjectKind>,
}

impl FakeCluster {
    pub fn refusing(mut self, name: &str) -> Self {
        self.refuse.insert(name.to_string());
        self
    }

    pub fn with_placement(mut self, pod: &str, node: &str) -> Self {
        self.placements.insert(pod.to_string(), node.to_string());
        self
    }

    pub fn with_counts(self, kind: ObjectKind, counts: &[usize]) -> Self {
        self.counts
            .lock()
            .unwrap()
            .insert(kind, counts.iter().copied().collect());
        self
    }

    pub fn failing_delete(mut self, kind: ObjectKind) -> Self {
        self.fail_delete = Some(kind);
        self
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }
}

impl Cluster for FakeCluster {
    type Error = FakeError;

    async fn create(&self, name: &str, _spec: &WorkSpec) -> Result<(), FakeError> {
        if self.refuse.contains(name) {
            return Err(FakeError(format!("admission denied for {name}")));
        }
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), tokio::time::Instant::now()));
        Ok(())
    }

    async fn placement_of(&self, subject: &str) -> Result<Option<String>, FakeError> {
        Ok(self.placements.get(subject).cloned())
    }

    async fn count(&self, kind: ObjectKind) -> Result<usize, FakeError> {
        let mut counts = self.counts.lock().unwrap();
        Ok(counts
            .get_mut(&kind)
            .and_then(|q| q.pop_front())
            .unwrap_or(0))
    }

    async fn delete_all(&self, kind: ObjectKind) -> Result<(), FakeError> {
        if self.fail_delete == Some(kind) {
            return Err(FakeError(format!("forbidden: cannot delete {kind}")));
        }
        self.deletes.lock().unwrap().push(kind);
        Ok(())
    }

    fn lifecycle_events(&self) -> BoxStream<'static, ClusterEvent> {
        stream::pending().boxed()
    }

    fn status_updates(&self) -> BoxStream<'static, StatusUpdate> {
        stream::pending().boxed()
    }
}
