//! # Sync
//!
//! One reconciliation pass, branching on the management state of the operator config.
//!
//! - `Unmanaged`: nothing to do.
//! - `Removed`: delete the operand namespace.
//! - `Managed`: observe, merge, persist, apply, report.
//!
//! A managed pass persists nothing until every observer has succeeded, so a
//! failing observer never leaves a half-merged document behind.

use super::status;
use super::types::{Reconciler, ReconcilerError, SyncOutcome};
use crate::constants::TARGET_NAMESPACE;
use crate::controller::document::{merge, ConfigDocument};
use crate::controller::observe::observe_all;
use crate::crd::{ManagementState, OperatorConfig};
use crate::observability::metrics;
use tracing::{debug, info, warn, Instrument};

impl Reconciler {
    /// Run one pass for `key`
    pub async fn sync(&self, key: &str) -> Result<SyncOutcome, ReconcilerError> {
        let span = tracing::info_span!("operator.sync", queue.key = key, management_state = tracing::field::Empty);
        async move {
            let config = self.configs.get().await?;
            let state = config.spec.management_state;
            tracing::Span::current().record("management_state", state.as_str());

            match state {
                ManagementState::Unmanaged => {
                    debug!("Operand is unmanaged, skipping");
                    Ok(SyncOutcome::default())
                }
                ManagementState::Removed => {
                    info!(resource.name = TARGET_NAMESPACE, "Operand removed, deleting namespace");
                    self.namespaces.delete(TARGET_NAMESPACE).await?;
                    Ok(SyncOutcome::default())
                }
                ManagementState::Managed => match self.sync_managed(config).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) if e.is_conflict() => {
                        debug!(error = %e, "Write conflict, retrying without reporting failure");
                        Err(e)
                    }
                    Err(e) => {
                        self.report_failure(&e).await;
                        Err(e)
                    }
                },
            }
        }
        .instrument(span)
        .await
    }

    /// Observe and merge without persisting anything
    pub async fn render(&self) -> Result<ConfigDocument, ReconcilerError> {
        let config = self.configs.get().await?;
        self.observe_and_merge(&config).map(|(document, _)| document)
    }

    fn observe_and_merge(
        &self,
        config: &OperatorConfig,
    ) -> Result<(ConfigDocument, Option<crate::crd::AdditionalTrustedCa>), ReconcilerError> {
        let prior = ConfigDocument::from_value(config.spec.observed_config.as_ref());
        let observed = observe_all(&self.observers, self.listers.as_ref(), &prior, &config.spec)
            .map_err(|(observer, source)| {
                metrics::increment_observer_errors(observer);
                ReconcilerError::Observe { observer, source }
            })?;
        let merged = merge(&prior, &observed.contributions)?;
        Ok((merged, observed.trusted_ca))
    }

    async fn sync_managed(&self, config: OperatorConfig) -> Result<SyncOutcome, ReconcilerError> {
        let (merged, trusted_ca) = self.observe_and_merge(&config)?;

        let mut desired = config.clone();
        desired.spec.observed_config = Some(merged.clone().into_value());
        if trusted_ca.is_some() {
            desired.spec.additional_trusted_ca = trusted_ca;
        }

        let current = if desired.spec == config.spec {
            config
        } else {
            info!("Observed configuration changed, updating operator config");
            self.configs.update_spec(&desired).await?
        };

        let log_level = current.spec.log_level.unwrap_or_default();
        let workload = self.workload.apply(&merged, log_level).await?;

        let now = chrono::Utc::now().to_rfc3339();
        let next = status::succeeded(&current, &workload, &now);
        if status::same_status(current.status.as_ref(), &next) {
            debug!("Status unchanged, skipping update");
        } else {
            let mut updated = current;
            updated.status = Some(next);
            self.configs.update_status(&updated).await?;
        }

        Ok(SyncOutcome {
            requeue: !workload.available(),
        })
    }

    /// Surface a failed pass through the failing condition. Best effort.
    async fn report_failure(&self, error: &ReconcilerError) {
        // Re-read: the spec may have been written earlier in the failed pass
        let config = match self.configs.get().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to read operator config for failure report");
                return;
            }
        };
        let now = chrono::Utc::now().to_rfc3339();
        let next = status::failed(&config, &error.to_string(), &now);
        if status::same_status(config.status.as_ref(), &next) {
            return;
        }
        let mut updated = config;
        updated.status = Some(next);
        if let Err(e) = self.configs.update_status(&updated).await {
            warn!(error = %e, "Failed to record failing condition");
        }
    }
}
