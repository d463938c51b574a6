//! # Types
//!
//! Core types for the reconciler.

use super::clients::{ClientError, NamespaceClient, OperatorConfigClient};
use super::workload::{WorkloadApplier, WorkloadError};
use crate::controller::document::MergeError;
use crate::controller::observe::{default_observers, Listers, ObserveError, Observer};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("observer {observer} failed: {source}")]
    Observe {
        observer: &'static str,
        #[source]
        source: ObserveError,
    },

    #[error("failed to merge observed configuration: {0}")]
    Merge(#[from] MergeError),

    #[error("operator config: {0}")]
    Client(#[from] ClientError),

    #[error("workload: {0}")]
    Workload(#[from] WorkloadError),
}

impl ReconcilerError {
    /// Errors caused by bad input that will not clear until a watched resource changes
    pub fn is_validation(&self) -> bool {
        match self {
            ReconcilerError::Observe { source, .. } => source.is_validation(),
            ReconcilerError::Merge(_) => true,
            ReconcilerError::Client(_) | ReconcilerError::Workload(_) => false,
        }
    }

    /// Lost an optimistic-concurrency race; the next pass starts from fresh state
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::Client(ClientError::Conflict(_)))
    }
}

/// What the worker should do with the key after a successful pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Retry with backoff even though the pass succeeded (operand not yet available)
    pub requeue: bool,
}

/// Everything a sync pass needs
///
/// Only one pass runs at a time, driven by the single worker.
pub struct Reconciler {
    pub listers: Arc<dyn Listers>,
    pub configs: Arc<dyn OperatorConfigClient>,
    pub namespaces: Arc<dyn NamespaceClient>,
    pub workload: Arc<dyn WorkloadApplier>,
    pub observers: Vec<Box<dyn Observer>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field(
                "observers",
                &self.observers.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        listers: Arc<dyn Listers>,
        configs: Arc<dyn OperatorConfigClient>,
        namespaces: Arc<dyn NamespaceClient>,
        workload: Arc<dyn WorkloadApplier>,
    ) -> Self {
        Self {
            listers,
            configs,
            namespaces,
            workload,
            observers: default_observers(),
        }
    }
}
