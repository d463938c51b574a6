//! # Build Controller Observer
//!
//! Copies build defaults and overrides from the cluster build settings into the
//! operand configuration.
//!
//! When the settings object exists every managed path is either set from a
//! non-empty source field or explicitly unset, so clearing a field on the
//! settings object clears it in the operand configuration too. When the object
//! does not exist the fragment is empty and earlier values pass through.

use super::{optional, Listers, Observation, ObserveError, Observer};
use crate::constants::CLUSTER_SINGLETON_NAME;
use crate::controller::document::{ConfigDocument, Fragment};
use crate::crd::OperatorConfigSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const DEFAULTS: &str = "buildDefaults";
const OVERRIDES: &str = "buildOverrides";

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildControllerObserver;

impl Observer for BuildControllerObserver {
    fn name(&self) -> &'static str {
        "build-controller"
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &["build.buildDefaults", "build.buildOverrides"]
    }

    fn observe(
        &self,
        listers: &dyn Listers,
        _current: &ConfigDocument,
        _record: &OperatorConfigSpec,
    ) -> Result<Observation, ObserveError> {
        let Some(build) = optional(listers.build_config(CLUSTER_SINGLETON_NAME))? else {
            return Ok(Fragment::new().into());
        };
        let defaults = &build.spec.build_defaults;
        let overrides = &build.spec.build_overrides;

        // Everything that can fail is computed before the fragment is built
        let node_selector = match &overrides.node_selector {
            Some(selector) => flatten_node_selector(selector)?,
            None => BTreeMap::new(),
        };

        let mut fragment = Fragment::new();
        put_str(&mut fragment, DEFAULTS, "gitHTTPProxy", &defaults.git_http_proxy);
        put_str(&mut fragment, DEFAULTS, "gitHTTPSProxy", &defaults.git_https_proxy);
        put_str(&mut fragment, DEFAULTS, "gitNoProxy", &defaults.git_no_proxy);
        put_list(&mut fragment, DEFAULTS, "env", &defaults.env)?;
        put_list(&mut fragment, DEFAULTS, "imageLabels", &defaults.image_labels)?;
        match &defaults.resources {
            Some(resources) if resources != &Default::default() => {
                fragment.set(&["build", DEFAULTS, "resources"], encode("resources", resources)?);
            }
            _ => {
                fragment.unset(&["build", DEFAULTS, "resources"]);
            }
        }

        put_list(&mut fragment, OVERRIDES, "imageLabels", &overrides.image_labels)?;
        if node_selector.is_empty() {
            fragment.unset(&["build", OVERRIDES, "nodeSelector"]);
        } else {
            fragment.set(
                &["build", OVERRIDES, "nodeSelector"],
                encode("nodeSelector", &node_selector)?,
            );
        }
        put_list(&mut fragment, OVERRIDES, "tolerations", &overrides.tolerations)?;
        match overrides.force_pull {
            Some(force_pull) => fragment.set(&["build", OVERRIDES, "forcePull"], force_pull),
            None => fragment.unset(&["build", OVERRIDES, "forcePull"]),
        };

        Ok(fragment.into())
    }
}

fn put_str(fragment: &mut Fragment, section: &str, field: &str, value: &str) {
    if value.is_empty() {
        fragment.unset(&["build", section, field]);
    } else {
        fragment.set(&["build", section, field], value);
    }
}

fn put_list<T: Serialize>(
    fragment: &mut Fragment,
    section: &str,
    field: &'static str,
    items: &[T],
) -> Result<(), ObserveError> {
    if items.is_empty() {
        fragment.unset(&["build", section, field]);
    } else {
        fragment.set(&["build", section, field], encode(field, items)?);
    }
    Ok(())
}

fn encode<T: Serialize + ?Sized>(field: &'static str, value: &T) -> Result<Value, ObserveError> {
    serde_json::to_value(value).map_err(|source| ObserveError::Encode { field, source })
}

/// Flatten a label selector into a plain `key: value` map
///
/// `matchLabels` entries are copied as-is. A `matchExpressions` entry is only
/// accepted with operator `In` and exactly one value, which is equivalent to a
/// `matchLabels` entry. Every other operator has no single-label equivalent and
/// is rejected, as is an expression that contradicts `matchLabels`.
pub fn flatten_node_selector(
    selector: &LabelSelector,
) -> Result<BTreeMap<String, String>, ObserveError> {
    let mut flattened = selector.match_labels.clone().unwrap_or_default();

    for requirement in selector.match_expressions.iter().flatten() {
        let values = requirement.values.as_deref().unwrap_or_default();
        let value = match (requirement.operator.as_str(), values) {
            ("In", [value]) => value,
            (operator, values) => {
                return Err(ObserveError::UnsupportedSelector(format!(
                    "{} {} {:?}",
                    requirement.key, operator, values
                )))
            }
        };
        match flattened.get(&requirement.key) {
            Some(existing) if existing != value => {
                return Err(ObserveError::ConflictingSelector {
                    key: requirement.key.clone(),
                    label_value: existing.clone(),
                    expression_value: value.clone(),
                })
            }
            Some(_) => {}
            None => {
                flattened.insert(requirement.key.clone(), value.clone());
            }
        }
    }

    Ok(flattened)
}
