//! # Listers
//!
//! Read-only lookups against the informer caches.

use crate::constants::{OPERATOR_NAMESPACE, USER_CONFIG_NAMESPACE};
use crate::crd::{Build, Image};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::reflector::{ObjectRef, Store};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListerError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("config maps in namespace {0} are not cached")]
    NamespaceNotWatched(String),
}

impl ListerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListerError::NotFound { .. })
    }
}

/// Point-in-time lookups of the resources observers read
pub trait Listers: Send + Sync {
    fn config_map(&self, namespace: &str, name: &str) -> Result<Arc<ConfigMap>, ListerError>;
    fn image_config(&self, name: &str) -> Result<Arc<Image>, ListerError>;
    fn build_config(&self, name: &str) -> Result<Arc<Build>, ListerError>;
}

/// [`Listers`] backed by kube-runtime reflector stores
#[derive(Clone)]
pub struct ReflectorListers {
    operator_config_maps: Store<ConfigMap>,
    user_config_maps: Store<ConfigMap>,
    builds: Store<Build>,
    images: Store<Image>,
}

impl std::fmt::Debug for ReflectorListers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectorListers")
            .field("operator_config_maps", &self.operator_config_maps.len())
            .field("user_config_maps", &self.user_config_maps.len())
            .field("builds", &self.builds.len())
            .field("images", &self.images.len())
            .finish()
    }
}

impl ReflectorListers {
    pub fn new(
        operator_config_maps: Store<ConfigMap>,
        user_config_maps: Store<ConfigMap>,
        builds: Store<Build>,
        images: Store<Image>,
    ) -> Self {
        Self {
            operator_config_maps,
            user_config_maps,
            builds,
            images,
        }
    }

    /// Wait until every backing store has seen its initial list
    pub async fn wait_until_ready(&self) -> Result<(), kube::runtime::reflector::store::WriterDropped> {
        self.operator_config_maps.wait_until_ready().await?;
        self.user_config_maps.wait_until_ready().await?;
        self.builds.wait_until_ready().await?;
        self.images.wait_until_ready().await
    }
}

impl Listers for ReflectorListers {
    fn config_map(&self, namespace: &str, name: &str) -> Result<Arc<ConfigMap>, ListerError> {
        let store = match namespace {
            OPERATOR_NAMESPACE => &self.operator_config_maps,
            USER_CONFIG_NAMESPACE => &self.user_config_maps,
            other => return Err(ListerError::NamespaceNotWatched(other.to_string())),
        };
        store
            .get(&ObjectRef::new(name).within(namespace))
            .ok_or_else(|| ListerError::NotFound {
                kind: "ConfigMap",
                name: format!("{namespace}/{name}"),
            })
    }

    fn image_config(&self, name: &str) -> Result<Arc<Image>, ListerError> {
        self.images
            .get(&ObjectRef::new(name))
            .ok_or_else(|| ListerError::NotFound {
                kind: "Image",
                name: name.to_string(),
            })
    }

    fn build_config(&self, name: &str) -> Result<Arc<Build>, ListerError> {
        self.builds
            .get(&ObjectRef::new(name))
            .ok_or_else(|| ListerError::NotFound {
                kind: "Build",
                name: name.to_string(),
            })
    }
}
