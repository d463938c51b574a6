//! # Trust Bundle
//!
//! Validation and fingerprinting of additional CA bundles supplied through a
//! config map.
//!
//! A bundle is valid when it holds at least one PEM block, every block is tagged
//! `CERTIFICATE`, and every payload parses as an X.509 certificate. The
//! fingerprint is a SHA-1 over the config map's `data` entries in key order, so
//! it changes whenever any entry changes and never depends on map iteration.

use k8s_openapi::api::core::v1::ConfigMap;
use sha1::{Digest, Sha1};
use thiserror::Error;

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Trust bundle validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrustBundleError {
    #[error("config map has no {0} entry")]
    MissingKey(String),

    #[error("bundle contains no PEM certificates")]
    NoCertificates,

    #[error("failed to parse PEM: {0}")]
    Pem(String),

    #[error("PEM block {index} is tagged {tag}, expected CERTIFICATE")]
    UnexpectedTag { index: usize, tag: String },

    #[error("PEM block {index} is not a valid X.509 certificate: {reason}")]
    InvalidCertificate { index: usize, reason: String },
}

/// Validate a PEM bundle, returning the number of certificates it holds
pub fn validate_bundle(pem_data: &str) -> Result<usize, TrustBundleError> {
    let blocks =
        ::pem::parse_many(pem_data.as_bytes()).map_err(|e| TrustBundleError::Pem(e.to_string()))?;
    if blocks.is_empty() {
        return Err(TrustBundleError::NoCertificates);
    }

    for (index, block) in blocks.iter().enumerate() {
        if block.tag() != CERTIFICATE_TAG {
            return Err(TrustBundleError::UnexpectedTag {
                index,
                tag: block.tag().to_string(),
            });
        }
        x509_parser::parse_x509_certificate(block.contents()).map_err(|e| {
            TrustBundleError::InvalidCertificate {
                index,
                reason: e.to_string(),
            }
        })?;
    }

    Ok(blocks.len())
}

/// Extract and validate the bundle stored under `key`
pub fn bundle_from_config_map<'a>(
    config_map: &'a ConfigMap,
    key: &str,
) -> Result<&'a str, TrustBundleError> {
    let bundle = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| TrustBundleError::MissingKey(key.to_string()))?;
    validate_bundle(bundle)?;
    Ok(bundle)
}

/// Hex encoded SHA-1 over the config map data, entries in key order
pub fn fingerprint(config_map: &ConfigMap) -> String {
    let mut hasher = Sha1::new();
    if let Some(data) = &config_map.data {
        // BTreeMap iterates in key order
        for (key, value) in data {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
    }
    hex::encode(hasher.finalize())
}
