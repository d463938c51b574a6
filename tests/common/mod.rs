//! Shared fixtures for the integration tests
//!
//! - [`Caches`]: reflector stores filled by hand, standing in for running informers
//! - [`FakeConfigClient`], [`FakeNamespaces`], [`FakeWorkload`]: in-memory write side
//! - object builders and a throwaway CA certificate

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use controller_manager_operator::constants::{CLUSTER_SINGLETON_NAME, OPERATOR_NAMESPACE, USER_CONFIG_NAMESPACE};
use controller_manager_operator::controller::document::ConfigDocument;
use controller_manager_operator::controller::observe::ReflectorListers;
use controller_manager_operator::controller::reconciler::{
    ClientError, NamespaceClient, OperatorConfigClient, Reconciler, WorkloadApplier,
    WorkloadError, WorkloadStatus,
};
use controller_manager_operator::crd::{
    Build, BuildSpec, Image, ImageSpec, ImageStatus, LogLevel, OperatorConfig, OperatorConfigSpec,
};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::watcher;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn config_map(namespace: &str, name: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

pub fn build(spec: BuildSpec) -> Build {
    Build::new(CLUSTER_SINGLETON_NAME, spec)
}

pub fn image(internal_registry_hostname: &str) -> Image {
    let mut image = Image::new(CLUSTER_SINGLETON_NAME, ImageSpec::default());
    image.status = Some(ImageStatus {
        internal_registry_hostname: internal_registry_hostname.to_string(),
    });
    image
}

pub fn operator_config(spec: OperatorConfigSpec) -> OperatorConfig {
    let mut config = OperatorConfig::new(CLUSTER_SINGLETON_NAME, spec);
    config.metadata.generation = Some(1);
    config.metadata.resource_version = Some("1".to_string());
    config
}

/// Self-signed CA certificate in PEM form
pub fn ca_pem(common_name: &str) -> String {
    let mut params = rcgen::CertificateParams::new(vec![common_name.to_string()]).unwrap();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let key = rcgen::KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().pem()
}

/// Reflector stores the observers read from, filled directly through their writers
pub struct Caches {
    operator_config_maps: Writer<ConfigMap>,
    user_config_maps: Writer<ConfigMap>,
    builds: Writer<Build>,
    images: Writer<Image>,
    pub listers: ReflectorListers,
}

impl Caches {
    pub fn new() -> Self {
        let (operator_store, operator_config_maps) = reflector::store();
        let (user_store, user_config_maps) = reflector::store();
        let (build_store, builds) = reflector::store();
        let (image_store, images) = reflector::store();
        Self {
            operator_config_maps,
            user_config_maps,
            builds,
            images,
            listers: ReflectorListers::new(operator_store, user_store, build_store, image_store),
        }
    }

    fn config_map_writer(&mut self, config_map: &ConfigMap) -> &mut Writer<ConfigMap> {
        match config_map.metadata.namespace.as_deref() {
            Some(OPERATOR_NAMESPACE) => &mut self.operator_config_maps,
            Some(USER_CONFIG_NAMESPACE) => &mut self.user_config_maps,
            other => panic!("config maps in {other:?} are not cached"),
        }
    }

    pub fn put_config_map(&mut self, config_map: ConfigMap) {
        self.config_map_writer(&config_map)
            .apply_watcher_event(&watcher::Event::Apply(config_map));
    }

    pub fn delete_config_map(&mut self, config_map: ConfigMap) {
        self.config_map_writer(&config_map)
            .apply_watcher_event(&watcher::Event::Delete(config_map));
    }

    pub fn put_build(&mut self, build: Build) {
        self.builds.apply_watcher_event(&watcher::Event::Apply(build));
    }

    pub fn delete_build(&mut self, build: Build) {
        self.builds.apply_watcher_event(&watcher::Event::Delete(build));
    }

    pub fn put_image(&mut self, image: Image) {
        self.images.apply_watcher_event(&watcher::Event::Apply(image));
    }
}

/// In-memory operator config with write counters
#[derive(Debug)]
pub struct FakeConfigClient {
    config: Mutex<OperatorConfig>,
    pub spec_writes: AtomicUsize,
    pub status_writes: AtomicUsize,
    /// Reject the next status write as if another writer got there first
    pub conflict_next_status_write: AtomicBool,
}

impl FakeConfigClient {
    pub fn new(config: OperatorConfig) -> Self {
        Self {
            config: Mutex::new(config),
            spec_writes: AtomicUsize::new(0),
            status_writes: AtomicUsize::new(0),
            conflict_next_status_write: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> OperatorConfig {
        self.config.lock().unwrap().clone()
    }

    pub fn set_spec(&self, spec: OperatorConfigSpec) {
        self.config.lock().unwrap().spec = spec;
    }

    pub fn spec_writes(&self) -> usize {
        self.spec_writes.load(Ordering::SeqCst)
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn bump_resource_version(config: &mut OperatorConfig) {
        let next = config
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        config.metadata.resource_version = Some(next.to_string());
    }
}

#[async_trait]
impl OperatorConfigClient for FakeConfigClient {
    async fn get(&self) -> Result<OperatorConfig, ClientError> {
        Ok(self.current())
    }

    async fn update_spec(&self, config: &OperatorConfig) -> Result<OperatorConfig, ClientError> {
        let mut stored = self.config.lock().unwrap();
        if stored.metadata.resource_version != config.metadata.resource_version {
            return Err(ClientError::Conflict("operator config".to_string()));
        }
        stored.spec = config.spec.clone();
        Self::bump_resource_version(&mut stored);
        self.spec_writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }

    async fn update_status(&self, config: &OperatorConfig) -> Result<OperatorConfig, ClientError> {
        let mut stored = self.config.lock().unwrap();
        if self.conflict_next_status_write.swap(false, Ordering::SeqCst)
            || stored.metadata.resource_version != config.metadata.resource_version
        {
            return Err(ClientError::Conflict("operator config status".to_string()));
        }
        stored.status = config.status.clone();
        Self::bump_resource_version(&mut stored);
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeNamespaces {
    pub deleted: Mutex<Vec<String>>,
    /// Fail every delete with this message instead of recording it
    pub fail_with: Mutex<Option<String>>,
}

impl FakeNamespaces {
    pub fn fail_deletes(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl NamespaceClient for FakeNamespaces {
    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(ClientError::Kube(kube::Error::Service(message.into())));
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Records every applied document and reports a fixed workload status
#[derive(Debug)]
pub struct FakeWorkload {
    pub status: Mutex<WorkloadStatus>,
    pub applied: Mutex<Vec<(ConfigDocument, LogLevel)>>,
}

impl FakeWorkload {
    pub fn available() -> Self {
        Self::with_status(WorkloadStatus {
            deployment_found: true,
            desired_replicas: 3,
            ready_replicas: 3,
            updated_replicas: 3,
            generation_pending: false,
        })
    }

    pub fn with_status(status: WorkloadStatus) -> Self {
        Self {
            status: Mutex::new(status),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn applies(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    pub fn last_applied(&self) -> Option<ConfigDocument> {
        self.applied.lock().unwrap().last().map(|(document, _)| document.clone())
    }

    pub fn last_log_level(&self) -> Option<LogLevel> {
        self.applied.lock().unwrap().last().map(|(_, level)| *level)
    }
}

#[async_trait]
impl WorkloadApplier for FakeWorkload {
    async fn apply(
        &self,
        document: &ConfigDocument,
        log_level: LogLevel,
    ) -> Result<WorkloadStatus, WorkloadError> {
        self.applied.lock().unwrap().push((document.clone(), log_level));
        Ok(*self.status.lock().unwrap())
    }
}

/// A reconciler over `caches` plus handles on its fakes
pub struct Harness {
    pub reconciler: Reconciler,
    pub configs: Arc<FakeConfigClient>,
    pub namespaces: Arc<FakeNamespaces>,
    pub workload: Arc<FakeWorkload>,
}

impl Harness {
    pub fn new(caches: &Caches, spec: OperatorConfigSpec, workload: FakeWorkload) -> Self {
        let configs = Arc::new(FakeConfigClient::new(operator_config(spec)));
        let namespaces = Arc::new(FakeNamespaces::default());
        let workload = Arc::new(workload);
        let reconciler = Reconciler::new(
            Arc::new(caches.listers.clone()),
            Arc::clone(&configs) as Arc<dyn OperatorConfigClient>,
            Arc::clone(&namespaces) as Arc<dyn NamespaceClient>,
            Arc::clone(&workload) as Arc<dyn WorkloadApplier>,
        );
        Self {
            reconciler,
            configs,
            namespaces,
            workload,
        }
    }
}
