//! # Reconciler Tests
//!
//! Sync passes against reflector-backed caches and in-memory API fakes.

mod common;

use common::{build, ca_pem, config_map, image, Caches, FakeWorkload, Harness};
use controller_manager_operator::constants::{
    ADDITIONAL_CA_MOUNT_PATH, AVAILABLE_CONDITION, IMAGES_CONFIG_MAP_NAME, OPERATOR_NAMESPACE,
    TARGET_NAMESPACE, USER_CONFIG_NAMESPACE, WORKLOAD_FAILING_CONDITION, WORK_QUEUE_KEY,
};
use controller_manager_operator::controller::reconciler::{ReconcilerError, WorkloadStatus};
use controller_manager_operator::controller::trust_bundle::fingerprint;
use controller_manager_operator::crd::{
    AdditionalTrustedCa, BuildSpec, ConfigMapReference, LogLevel, ManagementState,
    OperatorConfigSpec,
};
use std::sync::atomic::Ordering;
use serde_json::json;

fn managed() -> OperatorConfigSpec {
    OperatorConfigSpec::default()
}

fn populated_caches() -> Caches {
    let mut caches = Caches::new();
    caches.put_config_map(config_map(
        OPERATOR_NAMESPACE,
        IMAGES_CONFIG_MAP_NAME,
        &[("builderImage", "quay.io/builder:1"), ("deployerImage", "quay.io/deployer:1")],
    ));
    caches.put_image(image("image-registry.svc:5000"));
    caches
}

fn with_trusted_ca(caches: &mut Caches, bundle: &str) {
    with_named_trusted_ca(caches, "corp-ca", bundle);
}

fn with_named_trusted_ca(caches: &mut Caches, name: &str, bundle: &str) {
    caches.put_build(build(BuildSpec {
        additional_trusted_ca: ConfigMapReference {
            name: name.to_string(),
            namespace: String::new(),
        },
        ..Default::default()
    }));
    caches.put_config_map(config_map(USER_CONFIG_NAMESPACE, name, &[("ca.crt", bundle)]));
}

#[tokio::test]
async fn test_unmanaged_pass_does_nothing() {
    let caches = populated_caches();
    let harness = Harness::new(
        &caches,
        OperatorConfigSpec {
            management_state: ManagementState::Unmanaged,
            ..Default::default()
        },
        FakeWorkload::available(),
    );

    let outcome = harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert!(!outcome.requeue);
    assert_eq!(harness.workload.applies(), 0);
    assert_eq!(harness.configs.spec_writes(), 0);
    assert_eq!(harness.configs.status_writes(), 0);
    assert!(harness.namespaces.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_removed_pass_deletes_operand_namespace() {
    let caches = populated_caches();
    let harness = Harness::new(
        &caches,
        OperatorConfigSpec {
            management_state: ManagementState::Removed,
            ..Default::default()
        },
        FakeWorkload::available(),
    );

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert_eq!(
        *harness.namespaces.deleted.lock().unwrap(),
        vec![TARGET_NAMESPACE.to_string()]
    );
    assert_eq!(harness.workload.applies(), 0);
}

#[tokio::test]
async fn test_managed_pass_persists_applies_and_reports() {
    let caches = populated_caches();
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    let outcome = harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert!(!outcome.requeue);

    let stored = harness.configs.current();
    let expected = json!({
        "build": { "imageTemplateFormat": { "format": "quay.io/builder:1" } },
        "deployer": { "imageTemplateFormat": { "format": "quay.io/deployer:1" } },
        "dockerPullSecret": { "internalRegistryHostname": "image-registry.svc:5000" },
    });
    assert_eq!(stored.spec.observed_config, Some(expected.clone()));
    assert_eq!(harness.workload.last_applied().unwrap().into_value(), expected);

    let status = stored.status.unwrap();
    assert_eq!(status.ready_replicas, 3);
    assert_eq!(status.observed_generation, Some(1));
    assert_eq!(status.condition(AVAILABLE_CONDITION).unwrap().status, "True");
    assert_eq!(status.condition(WORKLOAD_FAILING_CONDITION).unwrap().status, "False");
}

#[tokio::test]
async fn test_second_pass_with_no_changes_writes_nothing() {
    let caches = populated_caches();
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert_eq!(harness.configs.spec_writes(), 1);
    assert_eq!(harness.configs.status_writes(), 1);
    let first = harness.configs.current();

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert_eq!(harness.configs.spec_writes(), 1);
    assert_eq!(harness.configs.status_writes(), 1);
    assert_eq!(harness.configs.current(), first);
    assert_eq!(harness.workload.applies(), 2);
}

#[tokio::test]
async fn test_operand_not_ready_requeues() {
    let caches = populated_caches();
    let harness = Harness::new(
        &caches,
        managed(),
        FakeWorkload::with_status(WorkloadStatus {
            deployment_found: true,
            desired_replicas: 3,
            ready_replicas: 1,
            updated_replicas: 3,
            generation_pending: false,
        }),
    );

    let outcome = harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert!(outcome.requeue);
    let status = harness.configs.current().status.unwrap();
    let available = status.condition(AVAILABLE_CONDITION).unwrap();
    assert_eq!(available.status, "False");
    assert_eq!(available.message.as_deref(), Some("1/3 replicas ready"));
}

#[tokio::test]
async fn test_trust_bundle_fingerprint_is_persisted() {
    let mut caches = populated_caches();
    with_trusted_ca(&mut caches, &ca_pem("corp-ca"));
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    let stored = harness.configs.current();
    let cached = stored.spec.additional_trusted_ca.clone().unwrap();
    assert_eq!(cached.config_map_name, "corp-ca");
    assert_eq!(
        stored.status.unwrap().additional_trusted_ca,
        Some(cached.clone())
    );
    assert_eq!(
        harness
            .workload
            .last_applied()
            .unwrap()
            .get_str(&["build", "additionalTrustedCA"]),
        Some(ADDITIONAL_CA_MOUNT_PATH)
    );

    // Rotating the bundle updates the fingerprint
    with_trusted_ca(&mut caches, &ca_pem("corp-ca-rotated"));
    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    let rotated = harness.configs.current().spec.additional_trusted_ca.unwrap();
    assert_ne!(rotated.sha1_hash, cached.sha1_hash);
    assert_eq!(harness.configs.spec_writes(), 2);
}

#[tokio::test]
async fn test_switching_trust_bundle_config_map_updates_record() {
    let mut caches = populated_caches();
    with_named_trusted_ca(&mut caches, "other-ca", &ca_pem("other-ca"));
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    let before = harness.configs.current().spec.additional_trusted_ca.unwrap();
    assert_eq!(before.config_map_name, "other-ca");

    let bundle = ca_pem("test-ca");
    with_named_trusted_ca(&mut caches, "test-ca", &bundle);
    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();

    let expected = AdditionalTrustedCa {
        sha1_hash: fingerprint(&config_map(USER_CONFIG_NAMESPACE, "test-ca", &[("ca.crt", &bundle)])),
        config_map_name: "test-ca".to_string(),
    };
    let stored = harness.configs.current();
    assert_eq!(stored.spec.additional_trusted_ca, Some(expected.clone()));
    assert_eq!(stored.status.unwrap().additional_trusted_ca, Some(expected.clone()));
    assert_ne!(expected.sha1_hash, before.sha1_hash);
}

#[tokio::test]
async fn test_failing_observer_persists_nothing_and_reports_failure() {
    let mut caches = populated_caches();
    with_trusted_ca(&mut caches, "not a certificate");
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    let error = harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap_err();
    assert!(matches!(
        error,
        ReconcilerError::Observe {
            observer: "additional-ca",
            ..
        }
    ));
    assert!(error.is_validation());
    assert_eq!(harness.configs.spec_writes(), 0);
    assert_eq!(harness.workload.applies(), 0);

    let stored = harness.configs.current();
    assert_eq!(stored.spec.observed_config, None);
    let failing = stored
        .status
        .as_ref()
        .and_then(|s| s.condition(WORKLOAD_FAILING_CONDITION))
        .cloned()
        .unwrap();
    assert_eq!(failing.status, "True");
    assert!(failing.message.unwrap().contains("additional-ca"));

    // Fixing the bundle clears the failure
    with_trusted_ca(&mut caches, &ca_pem("corp-ca"));
    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    let status = harness.configs.current().status.unwrap();
    assert_eq!(status.condition(WORKLOAD_FAILING_CONDITION).unwrap().status, "False");
}

#[tokio::test]
async fn test_observed_config_keeps_foreign_fields() {
    let caches = populated_caches();
    let harness = Harness::new(
        &caches,
        OperatorConfigSpec {
            observed_config: Some(json!({ "kind": "OpenShiftControllerManagerConfig" })),
            ..Default::default()
        },
        FakeWorkload::available(),
    );

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    let observed = harness.configs.current().spec.observed_config.unwrap();
    assert_eq!(observed["kind"], json!("OpenShiftControllerManagerConfig"));
    assert_eq!(
        observed["dockerPullSecret"]["internalRegistryHostname"],
        json!("image-registry.svc:5000")
    );
}

#[tokio::test]
async fn test_render_writes_nothing() {
    let caches = populated_caches();
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    let document = harness.reconciler.render().await.unwrap();
    assert_eq!(
        document.get_str(&["dockerPullSecret", "internalRegistryHostname"]),
        Some("image-registry.svc:5000")
    );
    assert_eq!(harness.configs.spec_writes(), 0);
    assert_eq!(harness.configs.status_writes(), 0);
    assert_eq!(harness.workload.applies(), 0);
}

#[tokio::test]
async fn test_log_level_is_passed_to_the_operand() {
    let caches = populated_caches();
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());

    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert_eq!(harness.workload.last_log_level(), Some(LogLevel::Normal));

    harness.configs.set_spec(OperatorConfigSpec {
        log_level: Some(LogLevel::Trace),
        ..harness.configs.current().spec
    });
    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    assert_eq!(harness.workload.last_log_level(), Some(LogLevel::Trace));
}

#[tokio::test]
async fn test_status_write_conflict_is_not_reported_as_failure() {
    let caches = populated_caches();
    let harness = Harness::new(&caches, managed(), FakeWorkload::available());
    harness
        .configs
        .conflict_next_status_write
        .store(true, Ordering::SeqCst);

    let error = harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap_err();
    assert!(error.is_conflict());
    assert!(!error.is_validation());
    assert_eq!(harness.configs.status_writes(), 0);
    assert!(harness.configs.current().status.is_none());

    // The retry succeeds and never saw a failing condition
    harness.reconciler.sync(WORK_QUEUE_KEY).await.unwrap();
    let status = harness.configs.current().status.unwrap();
    assert_eq!(status.condition(WORKLOAD_FAILING_CONDITION).unwrap().status, "False");
}
