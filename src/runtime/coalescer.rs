//! # Event Coalescer
//!
//! Maps change notifications from every watched resource kind onto the single
//! work-queue key.
//!
//! Each watched source is described by a [`Trigger`]. A notification that
//! matches any trigger enqueues the key; because the queue deduplicates pending
//! keys, a burst of unrelated changes collapses into one sync pass.

use crate::constants::{CLUSTER_SINGLETON_NAME, TARGET_NAMESPACE, WORK_QUEUE_KEY};
use crate::observability::metrics;
use crate::runtime::queue::WorkQueue;
use tracing::trace;

/// Resource kinds the operator watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    OperatorConfig,
    Deployment,
    ServiceAccount,
    Service,
    ConfigMap,
    Namespace,
    Build,
    Image,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::OperatorConfig => "operator-config",
            ResourceKind::Deployment => "deployment",
            ResourceKind::ServiceAccount => "service-account",
            ResourceKind::Service => "service",
            ResourceKind::ConfigMap => "config-map",
            ResourceKind::Namespace => "namespace",
            ResourceKind::Build => "build",
            ResourceKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Updated,
    Deleted,
}

/// One add/update/delete observed on a watched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
    pub change: ChangeType,
}

impl ChangeNotification {
    pub fn new(
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        change: ChangeType,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            change,
        }
    }
}

/// Which objects of a kind trigger a resync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Any,
    /// Only the object with this name
    Named(String),
    /// Only objects in this namespace
    InNamespace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub kind: ResourceKind,
    pub selector: Selector,
}

impl Trigger {
    pub fn any(kind: ResourceKind) -> Self {
        Self {
            kind,
            selector: Selector::Any,
        }
    }

    pub fn named(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            selector: Selector::Named(name.to_string()),
        }
    }

    pub fn matches(&self, notification: &ChangeNotification) -> bool {
        if self.kind != notification.kind {
            return false;
        }
        match &self.selector {
            Selector::Any => true,
            Selector::Named(name) => *name == notification.name,
            Selector::InNamespace(ns) => notification.namespace.as_deref() == Some(ns.as_str()),
        }
    }
}

/// The triggers the operator registers at startup
pub fn default_triggers() -> Vec<Trigger> {
    vec![
        Trigger::any(ResourceKind::OperatorConfig),
        Trigger::any(ResourceKind::Deployment),
        Trigger::any(ResourceKind::ServiceAccount),
        Trigger::any(ResourceKind::Service),
        Trigger::any(ResourceKind::ConfigMap),
        // The namespace watch is cluster-wide; only the operand namespace matters
        Trigger::named(ResourceKind::Namespace, TARGET_NAMESPACE),
        Trigger::named(ResourceKind::Build, CLUSTER_SINGLETON_NAME),
        Trigger::named(ResourceKind::Image, CLUSTER_SINGLETON_NAME),
    ]
}

#[derive(Debug, Clone)]
pub struct EventCoalescer {
    queue: WorkQueue<String>,
    key: String,
    triggers: Vec<Trigger>,
}

impl EventCoalescer {
    pub fn new(queue: WorkQueue<String>, key: impl Into<String>, triggers: Vec<Trigger>) -> Self {
        Self {
            queue,
            key: key.into(),
            triggers,
        }
    }

    /// Coalescer with [`default_triggers`] feeding [`WORK_QUEUE_KEY`]
    pub fn with_default_triggers(queue: WorkQueue<String>) -> Self {
        Self::new(queue, WORK_QUEUE_KEY, default_triggers())
    }

    /// Enqueue the key if any trigger accepts `notification`
    pub fn notify(&self, notification: &ChangeNotification) -> bool {
        if !self.triggers.iter().any(|t| t.matches(notification)) {
            trace!(
                kind = notification.kind.as_str(),
                resource.name = %notification.name,
                "Ignoring change notification"
            );
            return false;
        }
        trace!(
            kind = notification.kind.as_str(),
            resource.namespace = ?notification.namespace,
            resource.name = %notification.name,
            change = ?notification.change,
            "Change notification enqueued resync"
        );
        metrics::increment_coalesced_notifications(notification.kind.as_str());
        self.queue.add(self.key.clone());
        true
    }

    pub fn queue(&self) -> &WorkQueue<String> {
        &self.queue
    }
}
