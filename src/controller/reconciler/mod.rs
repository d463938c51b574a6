//! # Reconciler
//!
//! Drives the operand towards the configuration observed from the cluster.
//!
//! - `types`: reconciler context, errors and pass outcome
//! - `sync`: one reconciliation pass
//! - `status`: condition bookkeeping on the operator config
//! - `clients`: operator config and namespace writers
//! - `workload`: rendered config map and deployment rollout

mod clients;
mod status;
mod sync;
mod types;
mod workload;

pub use clients::{
    ClientError, KubeNamespaceClient, KubeOperatorConfigClient, NamespaceClient,
    OperatorConfigClient,
};
pub use status::{same_status, set_condition};
pub use types::{Reconciler, ReconcilerError, SyncOutcome};
pub use workload::{
    config_hash, render, KubeWorkloadApplier, WorkloadApplier, WorkloadError, WorkloadStatus,
};
