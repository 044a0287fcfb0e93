use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubeClusterError {
    #[error("cannot load kubeconfig {path}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: kube::config::KubeconfigError,
    },

    #[error("no usable cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),
}

pub type Result<T> = std::result::Result<T, KubeClusterError>;
