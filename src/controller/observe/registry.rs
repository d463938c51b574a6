//! Internal registry hostname from the cluster image settings.

use super::{optional, Listers, Observation, ObserveError, Observer};
use crate::constants::CLUSTER_SINGLETON_NAME;
use crate::controller::document::{ConfigDocument, Fragment};
use crate::crd::OperatorConfigSpec;

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryHostnameObserver;

impl Observer for RegistryHostnameObserver {
    fn name(&self) -> &'static str {
        "registry-hostname"
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &["dockerPullSecret.internalRegistryHostname"]
    }

    fn observe(
        &self,
        listers: &dyn Listers,
        _current: &ConfigDocument,
        _record: &OperatorConfigSpec,
    ) -> Result<Observation, ObserveError> {
        let mut fragment = Fragment::new();
        let hostname = optional(listers.image_config(CLUSTER_SINGLETON_NAME))?
            .and_then(|image| image.status.as_ref().map(|s| s.internal_registry_hostname.clone()))
            .filter(|h| !h.is_empty());
        if let Some(hostname) = hostname {
            fragment.set(&["dockerPullSecret", "internalRegistryHostname"], hostname);
        }
        Ok(fragment.into())
    }
}
