//! # OperatorConfig
//!
//! The operator's own configuration resource. The singleton named `cluster`
//! carries the management directive, the last observed operand configuration and
//! the cached trust-bundle fingerprint that must survive across sync passes.

use serde::{Deserialize, Serialize};

/// OpenShiftControllerManagerOperatorConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: openshiftcontrollermanager.operator.openshift.io/v1alpha1
/// kind: OpenShiftControllerManagerOperatorConfig
/// metadata:
///   name: cluster
/// spec:
///   managementState: Managed
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    kind = "OpenShiftControllerManagerOperatorConfig",
    root = "OperatorConfig",
    group = "openshiftcontrollermanager.operator.openshift.io",
    version = "v1alpha1",
    status = "crate::crd::OperatorConfigStatus",
    shortname = "ocmoc",
    derive = "PartialEq",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".spec.managementState"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}, {"name":"Failing", "type":"string", "jsonPath":".status.conditions[?(@.type==\"WorkloadFailing\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigSpec {
    /// Whether the operator manages, ignores or tears down the operand
    /// Default: Managed
    #[serde(default)]
    pub management_state: ManagementState,
    /// Operand log verbosity
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    /// Configuration document computed by the observers on the last successful pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub observed_config: Option<serde_json::Value>,
    /// Fingerprint and source of the additional trust bundle last observed
    #[serde(default, rename = "additionalTrustedCA", skip_serializing_if = "Option::is_none")]
    pub additional_trusted_ca: Option<AdditionalTrustedCa>,
}

/// Management directive for the operand
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum ManagementState {
    /// Reconcile the operand (default)
    #[default]
    Managed,
    /// Leave the operand alone
    Unmanaged,
    /// Delete the operand namespace
    Removed,
}

impl ManagementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagementState::Managed => "Managed",
            ManagementState::Unmanaged => "Unmanaged",
            ManagementState::Removed => "Removed",
        }
    }
}

/// Operand log verbosity levels
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum LogLevel {
    #[default]
    Normal,
    Debug,
    Trace,
    TraceAll,
}

impl LogLevel {
    /// klog `-v` verbosity the operand runs with
    pub fn verbosity(self) -> u8 {
        match self {
            LogLevel::Normal => 2,
            LogLevel::Debug => 4,
            LogLevel::Trace => 6,
            LogLevel::TraceAll => 8,
        }
    }
}

/// Cached trust-bundle fingerprint and the config map it was computed from
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalTrustedCa {
    /// Hex encoded SHA-1 over the config map data
    #[serde(default, rename = "sha1Hash")]
    pub sha1_hash: String,
    /// Name of the referenced config map
    #[serde(default)]
    pub config_map_name: String,
}

/// Status of the OperatorConfig resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigStatus {
    /// Generation of the spec the status was computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Ready replicas of the operand deployment
    #[serde(default)]
    pub ready_replicas: i32,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Mirror of `spec.additionalTrustedCA` after a successful pass
    #[serde(default, rename = "additionalTrustedCA", skip_serializing_if = "Option::is_none")]
    pub additional_trusted_ca: Option<AdditionalTrustedCa>,
}

impl OperatorConfigStatus {
    /// Find a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == type_)
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Compare everything except the transition timestamp
    pub fn same_state(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

fn preserve_unknown_fields(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_state_defaults_to_managed() {
        let spec: OperatorConfigSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.management_state, ManagementState::Managed);
        assert!(spec.additional_trusted_ca.is_none());
    }

    #[test]
    fn test_trusted_ca_field_names() {
        let spec = OperatorConfigSpec {
            additional_trusted_ca: Some(AdditionalTrustedCa {
                sha1_hash: "abc".to_string(),
                config_map_name: "my-ca".to_string(),
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["additionalTrustedCA"]["sha1Hash"], "abc");
        assert_eq!(value["additionalTrustedCA"]["configMapName"], "my-ca");
        assert_eq!(value["managementState"], "Managed");
    }

    #[test]
    fn test_log_level_verbosity() {
        let spec: OperatorConfigSpec = serde_json::from_str(r#"{"logLevel":"TraceAll"}"#).unwrap();
        assert_eq!(spec.log_level, Some(LogLevel::TraceAll));
        assert_eq!(LogLevel::TraceAll.verbosity(), 8);
        assert_eq!(LogLevel::default().verbosity(), 2);
    }

    #[test]
    fn test_condition_same_state_ignores_timestamp() {
        let a = Condition {
            r#type: "Available".to_string(),
            status: "True".to_string(),
            last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            reason: None,
            message: None,
        };
        let b = Condition {
            last_transition_time: None,
            ..a.clone()
        };
        assert!(a.same_state(&b));
    }
}
