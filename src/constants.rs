//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Resource names and namespaces are fixed by the platform. Tuning values
//! represent reasonable defaults and can be overridden via environment
//! variables (see [`crate::config::ControllerConfig`]).

/// Namespace the operand (controller-manager) runs in
pub const TARGET_NAMESPACE: &str = "openshift-controller-manager";

/// Namespace the operator itself runs in
pub const OPERATOR_NAMESPACE: &str = "openshift-controller-manager-operator";

/// Namespace holding user-specified global configuration (trust bundles etc.)
pub const USER_CONFIG_NAMESPACE: &str = "openshift-config";

/// Name of every cluster-scoped singleton we read or write
pub const CLUSTER_SINGLETON_NAME: &str = "cluster";

/// The single work-queue key. There is exactly one logical reconcile target.
pub const WORK_QUEUE_KEY: &str = "key";

/// Config map in [`OPERATOR_NAMESPACE`] carrying builder/deployer image pull specs
pub const IMAGES_CONFIG_MAP_NAME: &str = "openshift-controller-manager-images";

/// Key holding the builder image in [`IMAGES_CONFIG_MAP_NAME`]
pub const BUILDER_IMAGE_KEY: &str = "builderImage";

/// Key holding the deployer image in [`IMAGES_CONFIG_MAP_NAME`]
pub const DEPLOYER_IMAGE_KEY: &str = "deployerImage";

/// Data key holding the PEM bundle in a trust-bundle config map
pub const TRUSTED_CA_DATA_KEY: &str = "ca.crt";

/// Where the surrounding deployment tooling mounts the additional trust bundle
pub const ADDITIONAL_CA_MOUNT_PATH: &str = "/var/run/configmaps/additional-ca/additional-ca.crt";

/// Condition type surfaced on the operator config when syncs keep failing
pub const WORKLOAD_FAILING_CONDITION: &str = "WorkloadFailing";

/// Condition type reporting operand availability
pub const AVAILABLE_CONDITION: &str = "Available";

/// Condition type reporting an operand rollout in progress
pub const PROGRESSING_CONDITION: &str = "Progressing";

/// Operand deployment name in [`TARGET_NAMESPACE`]
pub const OPERAND_DEPLOYMENT_NAME: &str = "controller-manager";

/// Rendered operand configuration config map name in [`TARGET_NAMESPACE`]
pub const OPERAND_CONFIG_MAP_NAME: &str = "config";

/// Key of the rendered configuration document in [`OPERAND_CONFIG_MAP_NAME`]
pub const OPERAND_CONFIG_KEY: &str = "config.yaml";

/// Pod template annotation carrying the rendered configuration hash
pub const CONFIG_HASH_ANNOTATION: &str = "operator.openshift.io/config-hash";

/// Operand container in [`OPERAND_DEPLOYMENT_NAME`]
pub const OPERAND_CONTAINER_NAME: &str = "controller-manager";

/// Pod template annotation carrying the operand log verbosity
pub const LOG_VERBOSITY_ANNOTATION: &str = "operator.openshift.io/log-verbosity";

/// Operand container environment variable the verbosity is passed in
pub const OPERAND_VERBOSITY_ENV: &str = "LOG_VERBOSITY";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "controller-manager-operator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default global sync rate (tokens per second). 0.05 is three passes a minute.
pub const DEFAULT_SYNC_RATE_QPS: f64 = 0.05;

/// Default token bucket burst for the global sync rate limiter
pub const DEFAULT_SYNC_BURST: u32 = 4;

/// Default per-key retry backoff base (milliseconds)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 5;

/// Default per-key retry backoff cap (seconds)
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 1000;

/// Default time allowed for the informer caches to sync at startup (seconds)
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 60;
