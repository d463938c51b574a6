//! # CRD Generator
//!
//! Prints the operator config CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/operatorconfig.yaml
//! ```
//!
//! `Build` and `Image` are owned by the platform and are not generated here.

use controller_manager_operator::crd::OperatorConfig;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&OperatorConfig::crd())?);
    Ok(())
}
