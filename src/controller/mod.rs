//! # Controller
//!
//! Core operator logic.
//!
//! - `backoff`: Per-key exponential retry backoff
//! - `document`: Configuration document and fragment merge
//! - `observe`: Observers turning cluster state into configuration fragments
//! - `reconciler`: Sync pass, persistence and operand apply
//! - `trust_bundle`: CA bundle validation and fingerprinting

pub mod backoff;
pub mod document;
pub mod observe;
pub mod reconciler;
pub mod trust_bundle;
