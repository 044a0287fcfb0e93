use std::fmt::Debug;
use std::path::Path;

use futures::stream::{BoxStream, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::NamespaceResourceScope;
use kreplay_core::{Cluster, ClusterEvent, ObjectKind, StatusUpdate, WorkSpec};
use kube::api::{DeleteParams, ListParams, PostParams, PropagationPolicy};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{KubeClusterError, Result};
use crate::job::build_job;
use crate::notify::{lifecycle_from_event, status_from_job, NotificationStream};

/// A [`Cluster`] backed by one namespace of a Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    namespace: String,
}

impl KubeCluster {
    /// Connect using the kubeconfig at `kubeconfig`, or the ambient
    /// configuration (in-cluster, `KUBECONFIG`, `~/.kube/config`) when `None`.
    pub async fn connect(kubeconfig: Option<&Path>, namespace: &str) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig_err = |source| KubeClusterError::Kubeconfig {
                    path: path.to_path_buf(),
                    source,
                };
                let kc = Kubeconfig::read_from(path).map_err(kubeconfig_err)?;
                Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                    .await
                    .map_err(kubeconfig_err)?
            }
            None => Config::infer().await?,
        };
        info!(cluster = %config.cluster_url, namespace, "connecting to cluster");
        let client = Client::try_from(config)?;
        Ok(Self::from_client(client, namespace))
    }

    pub fn from_client(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn purge<K>(&self) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        self.api::<K>()
            .delete_collection(&params, &ListParams::default())
            .await?;
        Ok(())
    }

    async fn len<K>(&self) -> Result<usize>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>().list(&ListParams::default()).await?.items.len())
    }
}

impl Cluster for KubeCluster {
    type Error = KubeClusterError;

    async fn create(&self, name: &str, spec: &WorkSpec) -> Result<()> {
        self.api::<Job>()
            .create(&PostParams::default(), &build_job(name, spec))
            .await?;
        Ok(())
    }

    async fn placement_of(&self, subject: &str) -> Result<Option<String>> {
        let pod = self.api::<Pod>().get_opt(subject).await?;
        Ok(pod.and_then(|p| p.spec).and_then(|s| s.node_name))
    }

    async fn count(&self, kind: ObjectKind) -> Result<usize> {
        match kind {
            ObjectKind::Jobs => self.len::<Job>().await,
            ObjectKind::Pods => self.len::<Pod>().await,
            ObjectKind::Events => self.len::<Event>().await,
        }
    }

    async fn delete_all(&self, kind: ObjectKind) -> Result<()> {
        debug!(%kind, namespace = %self.namespace, "deleting collection");
        match kind {
            ObjectKind::Jobs => self.purge::<Job>().await,
            ObjectKind::Pods => self.purge::<Pod>().await,
            ObjectKind::Events => self.purge::<Event>().await,
        }
    }

    fn lifecycle_events(&self) -> BoxStream<'static, ClusterEvent> {
        NotificationStream::watch(self.api::<Event>(), "events", lifecycle_from_event).boxed()
    }

    fn status_updates(&self) -> BoxStream<'static, StatusUpdate> {
        NotificationStream::watch(self.api::<Job>(), "jobs", status_from_job).boxed()
    }
}
