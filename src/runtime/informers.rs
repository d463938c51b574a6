//! # Informers
//!
//! Watches every resource kind that can change the operand configuration and
//! turns watch events into [`ChangeNotification`]s for the [`EventCoalescer`].
//!
//! Kinds the observers read (config maps in the operator and user-config
//! namespaces, `Build` and `Image`) are also reflected into stores, which back
//! the [`ReflectorListers`] handed to the reconciler.

use super::coalescer::{ChangeNotification, ChangeType, EventCoalescer, ResourceKind};
use super::error_policy::handle_watch_stream_error;
use crate::constants::{OPERATOR_NAMESPACE, TARGET_NAMESPACE, USER_CONFIG_NAMESPACE};
use crate::controller::observe::ReflectorListers;
use crate::crd::{Build, Image, OperatorConfig};
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service, ServiceAccount};
use kube::runtime::reflector::Store;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Map a watch event to the notification it should raise
///
/// Initial-list bookkeeping events carry no object and raise nothing.
pub fn notification_for<K>(kind: ResourceKind, event: &watcher::Event<K>) -> Option<ChangeNotification>
where
    K: Resource,
{
    let (obj, change) = match event {
        watcher::Event::InitApply(obj) => (obj, ChangeType::Added),
        watcher::Event::Apply(obj) => (obj, ChangeType::Updated),
        watcher::Event::Delete(obj) => (obj, ChangeType::Deleted),
        watcher::Event::Init | watcher::Event::InitDone => return None,
    };
    Some(ChangeNotification::new(
        kind,
        obj.meta().namespace.as_deref(),
        &obj.name_any(),
        change,
    ))
}

/// Forward a watch stream into the coalescer until it ends
async fn drive<K, S>(kind: ResourceKind, stream: S, coalescer: EventCoalescer)
where
    K: Resource,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
{
    futures::pin_mut!(stream);
    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::InitDone) => {
                debug!(kind = kind.as_str(), "Initial list complete");
            }
            Ok(event) => {
                if let Some(notification) = notification_for(kind, &event) {
                    coalescer.notify(&notification);
                }
            }
            Err(e) => handle_watch_stream_error(kind, &e),
        }
    }
    debug!(kind = kind.as_str(), "Watch stream ended");
}

fn spawn_watch<K>(api: Api<K>, kind: ResourceKind, coalescer: EventCoalescer) -> JoinHandle<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    tokio::spawn(drive(kind, stream, coalescer))
}

fn spawn_reflected<K>(
    api: Api<K>,
    kind: ResourceKind,
    coalescer: EventCoalescer,
) -> (Store<K>, JoinHandle<()>)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    let (store, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher::Config::default())).default_backoff();
    (store, tokio::spawn(drive(kind, stream, coalescer)))
}

/// Running watches plus the stores they fill
#[derive(Debug)]
pub struct Informers {
    pub listers: ReflectorListers,
    tasks: Vec<JoinHandle<()>>,
}

impl Informers {
    /// Start every watch the operator needs
    pub fn start(client: &Client, coalescer: &EventCoalescer) -> Self {
        let mut tasks = Vec::new();

        tasks.push(spawn_watch(
            Api::<OperatorConfig>::all(client.clone()),
            ResourceKind::OperatorConfig,
            coalescer.clone(),
        ));
        tasks.push(spawn_watch(
            Api::<Deployment>::namespaced(client.clone(), TARGET_NAMESPACE),
            ResourceKind::Deployment,
            coalescer.clone(),
        ));
        tasks.push(spawn_watch(
            Api::<ServiceAccount>::namespaced(client.clone(), TARGET_NAMESPACE),
            ResourceKind::ServiceAccount,
            coalescer.clone(),
        ));
        tasks.push(spawn_watch(
            Api::<Service>::namespaced(client.clone(), TARGET_NAMESPACE),
            ResourceKind::Service,
            coalescer.clone(),
        ));
        tasks.push(spawn_watch(
            Api::<ConfigMap>::namespaced(client.clone(), TARGET_NAMESPACE),
            ResourceKind::ConfigMap,
            coalescer.clone(),
        ));
        tasks.push(spawn_watch(
            Api::<Namespace>::all(client.clone()),
            ResourceKind::Namespace,
            coalescer.clone(),
        ));

        let (operator_config_maps, task) = spawn_reflected(
            Api::<ConfigMap>::namespaced(client.clone(), OPERATOR_NAMESPACE),
            ResourceKind::ConfigMap,
            coalescer.clone(),
        );
        tasks.push(task);
        let (user_config_maps, task) = spawn_reflected(
            Api::<ConfigMap>::namespaced(client.clone(), USER_CONFIG_NAMESPACE),
            ResourceKind::ConfigMap,
            coalescer.clone(),
        );
        tasks.push(task);
        let (builds, task) = spawn_reflected(
            Api::<Build>::all(client.clone()),
            ResourceKind::Build,
            coalescer.clone(),
        );
        tasks.push(task);
        let (images, task) = spawn_reflected(
            Api::<Image>::all(client.clone()),
            ResourceKind::Image,
            coalescer.clone(),
        );
        tasks.push(task);

        info!(watches = tasks.len(), "Informers started");

        Self {
            listers: ReflectorListers::new(operator_config_maps, user_config_maps, builds, images),
            tasks,
        }
    }

    /// Stop every watch
    pub fn shut_down(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
