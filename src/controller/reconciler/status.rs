//! # Status
//!
//! Builds the operator config status from the outcome of a pass.
//!
//! Conditions only move their `lastTransitionTime` when their status flips, and
//! callers compare statuses with [`same_status`] so that an unchanged pass
//! writes nothing.

use super::workload::WorkloadStatus;
use crate::constants::{AVAILABLE_CONDITION, PROGRESSING_CONDITION, WORKLOAD_FAILING_CONDITION};
use crate::crd::{Condition, OperatorConfig, OperatorConfigStatus};

fn condition(type_: &str, status: bool, reason: &str, message: Option<String>) -> Condition {
    Condition {
        r#type: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        last_transition_time: None,
        reason: Some(reason.to_string()),
        message,
    }
}

/// Insert or replace a condition, keeping the transition time unless the status changed
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition, now: &str) {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            new.last_transition_time = if existing.status == new.status {
                existing.last_transition_time.clone()
            } else {
                Some(now.to_string())
            };
            *existing = new;
        }
        None => {
            new.last_transition_time = Some(now.to_string());
            conditions.push(new);
        }
    }
}

/// Status after a successful managed pass
pub fn succeeded(config: &OperatorConfig, workload: &WorkloadStatus, now: &str) -> OperatorConfigStatus {
    let mut status = config.status.clone().unwrap_or_default();
    status.observed_generation = config.metadata.generation;
    status.ready_replicas = workload.ready_replicas;
    status.additional_trusted_ca = config.spec.additional_trusted_ca.clone();

    set_condition(
        &mut status.conditions,
        condition(WORKLOAD_FAILING_CONDITION, false, "AsExpected", None),
        now,
    );
    let available = if workload.available() {
        condition(AVAILABLE_CONDITION, true, "AsExpected", None)
    } else if workload.deployment_found {
        condition(
            AVAILABLE_CONDITION,
            false,
            "NoPodsAvailable",
            Some(format!(
                "{}/{} replicas ready",
                workload.ready_replicas, workload.desired_replicas
            )),
        )
    } else {
        condition(
            AVAILABLE_CONDITION,
            false,
            "DeploymentMissing",
            Some("operand deployment does not exist".to_string()),
        )
    };
    set_condition(&mut status.conditions, available, now);
    let progressing = if workload.progressing() {
        condition(PROGRESSING_CONDITION, true, "RollingOut", None)
    } else {
        condition(PROGRESSING_CONDITION, false, "AsExpected", None)
    };
    set_condition(&mut status.conditions, progressing, now);
    status
}

/// Status after a failed managed pass. Only the failing condition changes.
pub fn failed(config: &OperatorConfig, message: &str, now: &str) -> OperatorConfigStatus {
    let mut status = config.status.clone().unwrap_or_default();
    set_condition(
        &mut status.conditions,
        condition(
            WORKLOAD_FAILING_CONDITION,
            true,
            "SyncError",
            Some(message.to_string()),
        ),
        now,
    );
    status
}

/// Compare two statuses ignoring condition timestamps
pub fn same_status(current: Option<&OperatorConfigStatus>, next: &OperatorConfigStatus) -> bool {
    let Some(current) = current else {
        return false;
    };
    current.observed_generation == next.observed_generation
        && current.ready_replicas == next.ready_replicas
        && current.additional_trusted_ca == next.additional_trusted_ca
        && current.conditions.len() == next.conditions.len()
        && current
            .conditions
            .iter()
            .zip(&next.conditions)
            .all(|(a, b)| a.same_state(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::OperatorConfigSpec;

    const T0: &str = "2024-01-01T00:00:00+00:00";
    const T1: &str = "2024-01-01T00:05:00+00:00";

    fn config_with(status: Option<OperatorConfigStatus>) -> OperatorConfig {
        let mut config = OperatorConfig::new("cluster", OperatorConfigSpec::default());
        config.metadata.generation = Some(4);
        config.status = status;
        config
    }

    fn ready() -> WorkloadStatus {
        WorkloadStatus {
            deployment_found: true,
            desired_replicas: 3,
            ready_replicas: 3,
            updated_replicas: 3,
            generation_pending: false,
        }
    }

    #[test]
    fn test_transition_time_only_moves_on_flip() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, condition("Available", true, "AsExpected", None), T0);
        set_condition(&mut conditions, condition("Available", true, "AsExpected", None), T1);
        assert_eq!(conditions[0].last_transition_time.as_deref(), Some(T0));

        set_condition(&mut conditions, condition("Available", false, "NoPodsAvailable", None), T1);
        assert_eq!(conditions[0].last_transition_time.as_deref(), Some(T1));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_second_identical_pass_is_unchanged() {
        let first = succeeded(&config_with(None), &ready(), T0);
        let second = succeeded(&config_with(Some(first.clone())), &ready(), T1);
        assert!(same_status(Some(&first), &second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_sets_only_failing_condition() {
        let healthy = succeeded(&config_with(None), &ready(), T0);
        let failing = failed(&config_with(Some(healthy.clone())), "boom", T1);

        let cond = failing.condition(WORKLOAD_FAILING_CONDITION).unwrap();
        assert_eq!(cond.status, "True");
        assert_eq!(cond.reason.as_deref(), Some("SyncError"));
        assert_eq!(cond.message.as_deref(), Some("boom"));
        assert_eq!(failing.condition(AVAILABLE_CONDITION), healthy.condition(AVAILABLE_CONDITION));
        assert!(!same_status(Some(&healthy), &failing));
    }

    #[test]
    fn test_missing_deployment_is_unavailable() {
        let status = succeeded(&config_with(None), &WorkloadStatus::missing(), T0);
        let available = status.condition(AVAILABLE_CONDITION).unwrap();
        assert_eq!(available.status, "False");
        assert_eq!(available.reason.as_deref(), Some("DeploymentMissing"));
    }
}
