//! # Additional CA Observer
//!
//! Wires the additional trust bundle referenced by the cluster build settings
//! into the operand configuration.
//!
//! The document only ever receives the in-container mount path. The bundle
//! itself is mounted by the deployment tooling, which rolls the pods when the
//! cached fingerprint on the operator config changes.

use super::{optional, Listers, Observation, ObserveError, Observer};
use crate::constants::{
    ADDITIONAL_CA_MOUNT_PATH, CLUSTER_SINGLETON_NAME, TRUSTED_CA_DATA_KEY, USER_CONFIG_NAMESPACE,
};
use crate::controller::document::{ConfigDocument, Fragment};
use crate::controller::trust_bundle;
use crate::crd::{AdditionalTrustedCa, OperatorConfigSpec};
use tracing::{info, warn};

const PATH: &[&str] = &["build", "additionalTrustedCA"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AdditionalCaObserver;

impl Observer for AdditionalCaObserver {
    fn name(&self) -> &'static str {
        "additional-ca"
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &["build.additionalTrustedCA"]
    }

    fn observe(
        &self,
        listers: &dyn Listers,
        _current: &ConfigDocument,
        record: &OperatorConfigSpec,
    ) -> Result<Observation, ObserveError> {
        let reference = optional(listers.build_config(CLUSTER_SINGLETON_NAME))?
            .map(|build| build.spec.additional_trusted_ca.clone())
            .filter(|reference| !reference.name.is_empty());
        let Some(reference) = reference else {
            let mut fragment = Fragment::new();
            fragment.unset(PATH);
            return Ok(fragment.into());
        };

        let namespace = if reference.namespace.is_empty() {
            USER_CONFIG_NAMESPACE
        } else {
            reference.namespace.as_str()
        };
        let Some(config_map) = optional(listers.config_map(namespace, &reference.name))? else {
            warn!(
                resource.namespace = namespace,
                resource.name = %reference.name,
                "Referenced trust bundle config map not found"
            );
            return Ok(Fragment::new().into());
        };

        trust_bundle::bundle_from_config_map(&config_map, TRUSTED_CA_DATA_KEY).map_err(
            |source| ObserveError::InvalidTrustBundle {
                namespace: namespace.to_string(),
                name: reference.name.clone(),
                source,
            },
        )?;

        let sha1_hash = trust_bundle::fingerprint(&config_map);
        let trusted_ca = match &record.additional_trusted_ca {
            Some(cached)
                if cached.sha1_hash == sha1_hash && cached.config_map_name == reference.name =>
            {
                cached.clone()
            }
            previous => {
                info!(
                    resource.name = %reference.name,
                    sha1 = %sha1_hash,
                    previous = ?previous.as_ref().map(|p| p.config_map_name.as_str()),
                    "Additional trust bundle changed"
                );
                AdditionalTrustedCa {
                    sha1_hash,
                    config_map_name: reference.name.clone(),
                }
            }
        };

        let mut fragment = Fragment::new();
        fragment.set(PATH, ADDITIONAL_CA_MOUNT_PATH);
        Ok(Observation {
            fragment,
            trusted_ca: Some(trusted_ca),
        })
    }
}
