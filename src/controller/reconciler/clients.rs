//! # API Clients
//!
//! Write-side collaborators of the reconciler, kept behind traits so the sync
//! logic can run against fakes.

use crate::constants::CLUSTER_SINGLETON_NAME;
use crate::crd::OperatorConfig;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(String),

    /// Optimistic concurrency failure. The caller retries with fresh state.
    #[error("conflict writing {0}")]
    Conflict(String),

    #[error("failed to encode {0}: {1}")]
    Encode(&'static str, #[source] serde_json::Error),

    #[error(transparent)]
    Kube(kube::Error),
}

impl ClientError {
    pub fn from_kube(what: &str, error: kube::Error) -> Self {
        match error {
            kube::Error::Api(api_err) if api_err.code == 404 => ClientError::NotFound(what.to_string()),
            kube::Error::Api(api_err) if api_err.code == 409 => ClientError::Conflict(what.to_string()),
            other => ClientError::Kube(other),
        }
    }
}

/// Reads and writes the `cluster` operator config
#[async_trait]
pub trait OperatorConfigClient: Send + Sync {
    async fn get(&self) -> Result<OperatorConfig, ClientError>;

    /// Replace the spec. The object's resourceVersion guards against lost updates.
    async fn update_spec(&self, config: &OperatorConfig) -> Result<OperatorConfig, ClientError>;

    /// Write the status subresource. The object's resourceVersion guards against lost updates.
    async fn update_status(&self, config: &OperatorConfig) -> Result<OperatorConfig, ClientError>;
}

/// Deletes namespaces
#[async_trait]
pub trait NamespaceClient: Send + Sync {
    /// Delete `name`. A namespace that is already gone counts as deleted.
    async fn delete(&self, name: &str) -> Result<(), ClientError>;
}

#[derive(Clone)]
pub struct KubeOperatorConfigClient {
    api: Api<OperatorConfig>,
}

impl std::fmt::Debug for KubeOperatorConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeOperatorConfigClient").finish_non_exhaustive()
    }
}

impl KubeOperatorConfigClient {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl OperatorConfigClient for KubeOperatorConfigClient {
    async fn get(&self) -> Result<OperatorConfig, ClientError> {
        self.api
            .get(CLUSTER_SINGLETON_NAME)
            .await
            .map_err(|e| ClientError::from_kube("operator config", e))
    }

    async fn update_spec(&self, config: &OperatorConfig) -> Result<OperatorConfig, ClientError> {
        debug!(resource.name = CLUSTER_SINGLETON_NAME, "Replacing operator config spec");
        self.api
            .replace(CLUSTER_SINGLETON_NAME, &PostParams::default(), config)
            .await
            .map_err(|e| ClientError::from_kube("operator config", e))
    }

    async fn update_status(&self, config: &OperatorConfig) -> Result<OperatorConfig, ClientError> {
        debug!(resource.name = CLUSTER_SINGLETON_NAME, "Updating operator config status");
        let status = serde_json::to_value(&config.status)
            .map_err(|e| ClientError::Encode("operator config status", e))?;
        // resourceVersion in a merge patch makes the API server reject stale writes with 409
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": config.metadata.resource_version },
            "status": status,
        });
        self.api
            .patch_status(
                CLUSTER_SINGLETON_NAME,
                &PatchParams::default(),
                &Patch::Merge(patch),
            )
            .await
            .map_err(|e| ClientError::from_kube("operator config status", e))
    }
}

#[derive(Clone)]
pub struct KubeNamespaceClient {
    api: Api<Namespace>,
}

impl std::fmt::Debug for KubeNamespaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeNamespaceClient").finish_non_exhaustive()
    }
}

impl KubeNamespaceClient {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NamespaceClient for KubeNamespaceClient {
    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(resource.name = name, "Namespace deletion requested");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(resource.name = name, "Namespace already gone");
                Ok(())
            }
            Err(e) => Err(ClientError::from_kube(name, e)),
        }
    }
}
