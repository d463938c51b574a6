//! # Observers
//!
//! Each observer reads one kind of external resource from the local caches and
//! turns it into a [`Fragment`] of the operand configuration.
//!
//! - `images` - builder/deployer pull specs from the images config map
//! - `registry` - internal registry hostname from the cluster image settings
//! - `build` - build defaults and overrides from the cluster build settings
//! - `additional_ca` - additional trust bundle referenced by the build settings
//!
//! Observers are pure with respect to the cluster: they only read through
//! [`Listers`] and never write. Anything that must outlive the pass (the cached
//! trust-bundle fingerprint) is returned in the [`Observation`] for the
//! reconciler to persist.

mod additional_ca;
mod build;
mod images;
mod listers;
mod registry;

pub use additional_ca::AdditionalCaObserver;
pub use build::{flatten_node_selector, BuildControllerObserver};
pub use images::ImagesObserver;
pub use listers::{ListerError, Listers, ReflectorListers};
pub use registry::RegistryHostnameObserver;

use crate::controller::document::{ConfigDocument, Contribution, Fragment};
use crate::controller::trust_bundle::TrustBundleError;
use crate::crd::{AdditionalTrustedCa, OperatorConfigSpec};
use thiserror::Error;

/// Errors returned by observers
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("unsupported node selector requirement: {0}")]
    UnsupportedSelector(String),

    #[error("node selector key {key} is {label_value} in matchLabels but {expression_value} in matchExpressions")]
    ConflictingSelector {
        key: String,
        label_value: String,
        expression_value: String,
    },

    #[error("invalid trust bundle in config map {namespace}/{name}: {source}")]
    InvalidTrustBundle {
        namespace: String,
        name: String,
        #[source]
        source: TrustBundleError,
    },

    #[error("failed to encode {field}: {source}")]
    Encode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Lister(#[from] ListerError),
}

impl ObserveError {
    /// Validation errors come from bad user input and need a resource change to clear.
    /// Everything else is transient.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ObserveError::Lister(_))
    }
}

/// Result of one observer call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub fragment: Fragment,
    /// Trust-bundle reference to cache on the operator config. `None` leaves it untouched.
    pub trusted_ca: Option<AdditionalTrustedCa>,
}

impl From<Fragment> for Observation {
    fn from(fragment: Fragment) -> Self {
        Self {
            fragment,
            trusted_ca: None,
        }
    }
}

/// A source of configuration fragments
pub trait Observer: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Dotted document paths this observer is allowed to write beneath
    fn namespaces(&self) -> &'static [&'static str];

    /// Produce this observer's fragment.
    ///
    /// `current` is the document from the previous pass and `record` the
    /// operator config spec as last persisted. On error nothing from this
    /// observer may be applied.
    fn observe(
        &self,
        listers: &dyn Listers,
        current: &ConfigDocument,
        record: &OperatorConfigSpec,
    ) -> Result<Observation, ObserveError>;
}

/// The observers run on every managed pass, in order
pub fn default_observers() -> Vec<Box<dyn Observer>> {
    vec![
        Box::new(ImagesObserver),
        Box::new(RegistryHostnameObserver),
        Box::new(BuildControllerObserver),
        Box::new(AdditionalCaObserver),
    ]
}

/// Everything collected from one round of observers
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    pub contributions: Vec<Contribution>,
    pub trusted_ca: Option<AdditionalTrustedCa>,
}

/// Run every observer, stopping at the first error
pub fn observe_all(
    observers: &[Box<dyn Observer>],
    listers: &dyn Listers,
    current: &ConfigDocument,
    record: &OperatorConfigSpec,
) -> Result<ObservedState, (&'static str, ObserveError)> {
    let mut state = ObservedState::default();
    for observer in observers {
        let observation = observer
            .observe(listers, current, record)
            .map_err(|e| (observer.name(), e))?;
        tracing::debug!(
            observer = observer.name(),
            ops = observation.fragment.ops().len(),
            "Observer produced fragment"
        );
        if observation.trusted_ca.is_some() {
            state.trusted_ca = observation.trusted_ca;
        }
        state.contributions.push(Contribution {
            observer: observer.name(),
            namespaces: observer.namespaces(),
            fragment: observation.fragment,
        });
    }
    Ok(state)
}

/// Treat a not-found lookup as absent, propagate anything else
pub(crate) fn optional<T>(result: Result<T, ListerError>) -> Result<Option<T>, ObserveError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
