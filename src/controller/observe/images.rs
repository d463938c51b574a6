//! Builder and deployer image pull specs.

use super::{optional, Listers, Observation, ObserveError, Observer};
use crate::constants::{
    BUILDER_IMAGE_KEY, DEPLOYER_IMAGE_KEY, IMAGES_CONFIG_MAP_NAME, OPERATOR_NAMESPACE,
};
use crate::controller::document::{ConfigDocument, Fragment};
use crate::crd::OperatorConfigSpec;

const BUILD_FORMAT: &[&str] = &["build", "imageTemplateFormat", "format"];
const DEPLOYER_FORMAT: &[&str] = &["deployer", "imageTemplateFormat", "format"];

/// Copies `builderImage` and `deployerImage` from the operator's images config map
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagesObserver;

impl Observer for ImagesObserver {
    fn name(&self) -> &'static str {
        "images"
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &["build.imageTemplateFormat", "deployer.imageTemplateFormat"]
    }

    fn observe(
        &self,
        listers: &dyn Listers,
        _current: &ConfigDocument,
        _record: &OperatorConfigSpec,
    ) -> Result<Observation, ObserveError> {
        let mut fragment = Fragment::new();
        let Some(config_map) =
            optional(listers.config_map(OPERATOR_NAMESPACE, IMAGES_CONFIG_MAP_NAME))?
        else {
            return Ok(fragment.into());
        };
        let Some(data) = config_map.data.as_ref() else {
            return Ok(fragment.into());
        };

        for (key, path) in [(BUILDER_IMAGE_KEY, BUILD_FORMAT), (DEPLOYER_IMAGE_KEY, DEPLOYER_FORMAT)] {
            if let Some(image) = data.get(key).filter(|v| !v.is_empty()) {
                fragment.set(path, image.as_str());
            }
        }
        Ok(fragment.into())
    }
}
