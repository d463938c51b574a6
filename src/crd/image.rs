//! # Image
//!
//! Cluster-wide image settings (`images.config.openshift.io`). Only the status
//! field reporting the internal registry hostname is read.

use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    kind = "Image",
    group = "config.openshift.io",
    version = "v1",
    status = "crate::crd::ImageStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Registries trusted for image pulls. Not used by the operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_registries_for_import: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatus {
    /// Hostname of the integrated registry as seen from inside the cluster
    #[serde(default)]
    pub internal_registry_hostname: String,
}
