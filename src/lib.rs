//! # Controller-Manager Operator
//!
//! A Kubernetes operator that keeps the controller-manager operand configured
//! from cluster state.
//!
//! ## Overview
//!
//! 1. **Watch** - Informers watch the operator config, the operand's objects,
//!    the image and build cluster configs and a few config maps.
//! 2. **Coalesce** - Every relevant change collapses into a single work-queue key.
//! 3. **Observe** - Independent observers each turn part of the cluster state
//!    into a fragment of the operand configuration.
//! 4. **Merge** - Fragments merge into the previously observed configuration,
//!    each observer confined to its own paths.
//! 5. **Apply** - The merged document is persisted on the operator config,
//!    rendered into the operand config map and rolled out to the deployment.
//!
//! Sync passes are serialized and gated by a global token bucket; failed
//! passes are retried with per-key exponential backoff.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod server;
