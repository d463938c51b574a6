//! # Build
//!
//! Cluster-wide build settings (`builds.config.openshift.io`). Read-only to this
//! operator; the `cluster` singleton feeds the build-controller and
//! additional-CA observers.

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    kind = "Build",
    group = "config.openshift.io",
    version = "v1",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    /// Config map holding additional CAs trusted during builds
    #[serde(default, rename = "additionalTrustedCA")]
    pub additional_trusted_ca: ConfigMapReference,
    /// Defaults applied to builds unless the build sets them
    #[serde(default)]
    pub build_defaults: BuildDefaults,
    /// Settings forced onto every build
    #[serde(default)]
    pub build_overrides: BuildOverrides,
}

/// Reference to a config map by namespace and name
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConfigMapReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildDefaults {
    #[serde(default, rename = "gitHTTPProxy")]
    pub git_http_proxy: String,
    #[serde(default, rename = "gitHTTPSProxy")]
    pub git_https_proxy: String,
    #[serde(default)]
    pub git_no_proxy: String,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub image_labels: Vec<ImageLabel>,
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildOverrides {
    #[serde(default)]
    pub image_labels: Vec<ImageLabel>,
    #[serde(default)]
    pub node_selector: Option<LabelSelector>,
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
    #[serde(default)]
    pub force_pull: Option<bool>,
}

/// Label applied to images produced by builds
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImageLabel {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_spec_deserializes_proxy_field_names() {
        let spec: BuildSpec = serde_json::from_value(serde_json::json!({
            "additionalTrustedCA": {"name": "user-ca"},
            "buildDefaults": {
                "gitHTTPProxy": "http://proxy:3128",
                "gitHTTPSProxy": "https://proxy:3129",
                "gitNoProxy": ".cluster.local"
            },
            "buildOverrides": {"forcePull": true}
        }))
        .unwrap();
        assert_eq!(spec.additional_trusted_ca.name, "user-ca");
        assert_eq!(spec.additional_trusted_ca.namespace, "");
        assert_eq!(spec.build_defaults.git_http_proxy, "http://proxy:3128");
        assert_eq!(spec.build_defaults.git_https_proxy, "https://proxy:3129");
        assert_eq!(spec.build_defaults.git_no_proxy, ".cluster.local");
        assert_eq!(spec.build_overrides.force_pull, Some(true));
    }
}
