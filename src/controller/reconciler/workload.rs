//! # Workload
//!
//! Pushes the merged configuration to the operand and reports how the operand
//! deployment is doing.
//!
//! The rendered document lands in the `config` config map as `config.yaml`. A
//! hash of the rendered text is stamped onto the deployment's pod template so
//! that a configuration change rolls the pods. The log verbosity from the
//! operator config is passed to the operand container the same way. Creating the deployment itself
//! is left to the manifests that install the operand; until it exists the
//! workload is reported as unavailable.

use crate::constants::{
    CONFIG_HASH_ANNOTATION, FIELD_MANAGER, LOG_VERBOSITY_ANNOTATION, OPERAND_CONFIG_KEY,
    OPERAND_CONFIG_MAP_NAME, OPERAND_CONTAINER_NAME, OPERAND_DEPLOYMENT_NAME,
    OPERAND_VERBOSITY_ENV, TARGET_NAMESPACE,
};
use crate::controller::document::ConfigDocument;
use crate::crd::LogLevel;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("failed to render operand configuration: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("failed to apply {what}: {source}")]
    Kube {
        what: &'static str,
        #[source]
        source: kube::Error,
    },
}

/// Replica counts of the operand deployment after an apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub deployment_found: bool,
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,
    /// Deployment controller has not yet observed the latest spec
    pub generation_pending: bool,
}

impl WorkloadStatus {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn available(&self) -> bool {
        self.deployment_found && self.desired_replicas > 0 && self.ready_replicas >= self.desired_replicas
    }

    pub fn progressing(&self) -> bool {
        self.deployment_found
            && (self.generation_pending || self.updated_replicas < self.desired_replicas)
    }

    pub fn from_deployment(deployment: &Deployment) -> Self {
        let desired_replicas = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let status = deployment.status.as_ref();
        let generation = deployment.metadata.generation.unwrap_or(0);
        let observed_generation = status.and_then(|s| s.observed_generation).unwrap_or(0);
        Self {
            deployment_found: true,
            desired_replicas,
            ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            updated_replicas: status.and_then(|s| s.updated_replicas).unwrap_or(0),
            generation_pending: observed_generation < generation,
        }
    }
}

/// Applies the merged configuration to the operand
#[async_trait]
pub trait WorkloadApplier: Send + Sync {
    async fn apply(
        &self,
        document: &ConfigDocument,
        log_level: LogLevel,
    ) -> Result<WorkloadStatus, WorkloadError>;
}

/// Render the document as the operand reads it
pub fn render(document: &ConfigDocument) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(document.as_map())
}

/// Hex encoded SHA-1 of the rendered configuration
pub fn config_hash(rendered: &str) -> String {
    hex::encode(Sha1::digest(rendered.as_bytes()))
}

/// Whether the pod template already carries `hash` and `verbosity`
pub fn rollout_current(deployment: &Deployment, hash: &str, verbosity: &str) -> bool {
    let annotations = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.annotations.as_ref());
    annotations.is_some_and(|a| {
        a.get(CONFIG_HASH_ANNOTATION).map(String::as_str) == Some(hash)
            && a.get(LOG_VERBOSITY_ANNOTATION).map(String::as_str) == Some(verbosity)
    })
}

/// Strategic merge patch rolling the pod template to `hash` and `verbosity`
///
/// Containers and env vars merge by name, so the rest of the template is untouched.
pub fn rollout_patch(hash: &str, verbosity: &str) -> serde_json::Value {
    serde_json::json!({
        "spec": { "template": {
            "metadata": { "annotations": {
                CONFIG_HASH_ANNOTATION: hash,
                LOG_VERBOSITY_ANNOTATION: verbosity,
            }},
            "spec": { "containers": [{
                "name": OPERAND_CONTAINER_NAME,
                "env": [{ "name": OPERAND_VERBOSITY_ENV, "value": verbosity }],
            }]},
        }}
    })
}

#[derive(Clone)]
pub struct KubeWorkloadApplier {
    config_maps: Api<ConfigMap>,
    deployments: Api<Deployment>,
}

impl std::fmt::Debug for KubeWorkloadApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWorkloadApplier").finish_non_exhaustive()
    }
}

impl KubeWorkloadApplier {
    pub fn new(client: Client) -> Self {
        Self {
            config_maps: Api::namespaced(client.clone(), TARGET_NAMESPACE),
            deployments: Api::namespaced(client, TARGET_NAMESPACE),
        }
    }
}

#[async_trait]
impl WorkloadApplier for KubeWorkloadApplier {
    async fn apply(
        &self,
        document: &ConfigDocument,
        log_level: LogLevel,
    ) -> Result<WorkloadStatus, WorkloadError> {
        let rendered = render(document)?;
        let hash = config_hash(&rendered);
        let verbosity = log_level.verbosity().to_string();

        let config_map = serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": OPERAND_CONFIG_MAP_NAME,
                "namespace": TARGET_NAMESPACE,
            },
            "data": { OPERAND_CONFIG_KEY: rendered },
        });
        self.config_maps
            .patch(
                OPERAND_CONFIG_MAP_NAME,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(config_map),
            )
            .await
            .map_err(|source| WorkloadError::Kube {
                what: "operand config map",
                source,
            })?;

        let deployment = self
            .deployments
            .get_opt(OPERAND_DEPLOYMENT_NAME)
            .await
            .map_err(|source| WorkloadError::Kube {
                what: "operand deployment",
                source,
            })?;
        let Some(deployment) = deployment else {
            debug!(
                resource.namespace = TARGET_NAMESPACE,
                resource.name = OPERAND_DEPLOYMENT_NAME,
                "Operand deployment not found"
            );
            return Ok(WorkloadStatus::missing());
        };

        if rollout_current(&deployment, &hash, &verbosity) {
            return Ok(WorkloadStatus::from_deployment(&deployment));
        }

        info!(
            resource.name = OPERAND_DEPLOYMENT_NAME,
            config_hash = %hash,
            verbosity = %verbosity,
            "Operand configuration changed, rolling deployment"
        );
        let patched = self
            .deployments
            .patch(
                OPERAND_DEPLOYMENT_NAME,
                &PatchParams::default(),
                &Patch::Strategic(rollout_patch(&hash, &verbosity)),
            )
            .await
            .map_err(|source| WorkloadError::Kube {
                what: "operand deployment",
                source,
            })?;
        Ok(WorkloadStatus::from_deployment(&patched))
    }
}
