//! # Custom Resource Definitions
//!
//! Resource types the operator reads and writes.
//!
//! ## Module Structure
//!
//! - `operator.rs` - The operator's own config resource (spec, status, conditions)
//! - `build.rs` - Cluster-wide build settings (`config.openshift.io/v1`, read-only)
//! - `image.rs` - Cluster-wide image settings (`config.openshift.io/v1`, read-only)
//!
//! Only [`OperatorConfig`] is owned by this operator and has a generated CRD
//! manifest. `Build` and `Image` are installed by the platform, so their schema
//! generation is disabled.

mod build;
mod image;
mod operator;

pub use build::{
    Build, BuildDefaults, BuildOverrides, BuildSpec, ConfigMapReference, ImageLabel,
};
pub use image::{Image, ImageSpec, ImageStatus};
pub use operator::{
    AdditionalTrustedCa, Condition, LogLevel, ManagementState, OperatorConfig,
    OperatorConfigSpec, OperatorConfigStatus,
};
