//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables.

use std::time::Duration;

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Global sync rate in tokens per second
    /// Bounds how often a reconcile pass may start regardless of event bursts
    pub sync_rate_qps: f64,
    /// Token bucket burst for the global sync rate limiter
    pub sync_burst: u32,
    /// Per-key retry backoff base (milliseconds)
    pub retry_base_delay_ms: u64,
    /// Per-key retry backoff cap (seconds)
    pub retry_max_delay_secs: u64,
    /// How long to wait for informer caches before giving up at startup (seconds)
    pub cache_sync_timeout_secs: u64,
    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            sync_rate_qps: DEFAULT_SYNC_RATE_QPS,
            sync_burst: DEFAULT_SYNC_BURST,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_secs: DEFAULT_RETRY_MAX_DELAY_SECS,
            cache_sync_timeout_secs: DEFAULT_CACHE_SYNC_TIMEOUT_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        let config = Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            sync_rate_qps: env_var_or_default("SYNC_RATE_QPS", DEFAULT_SYNC_RATE_QPS),
            sync_burst: env_var_or_default("SYNC_BURST", DEFAULT_SYNC_BURST),
            retry_base_delay_ms: env_var_or_default(
                "RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
            ),
            retry_max_delay_secs: env_var_or_default(
                "RETRY_MAX_DELAY_SECS",
                DEFAULT_RETRY_MAX_DELAY_SECS,
            ),
            cache_sync_timeout_secs: env_var_or_default(
                "CACHE_SYNC_TIMEOUT_SECS",
                DEFAULT_CACHE_SYNC_TIMEOUT_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        };
        config.sanitized()
    }

    /// Clamp values that would stall or hot-loop the sync loop
    fn sanitized(mut self) -> Self {
        if !self.sync_rate_qps.is_finite() || self.sync_rate_qps <= 0.0 {
            self.sync_rate_qps = crate::constants::DEFAULT_SYNC_RATE_QPS;
        }
        self.sync_burst = self.sync_burst.max(1);
        self.retry_base_delay_ms = self.retry_base_delay_ms.max(1);
        self
    }

    /// Get per-key retry backoff base duration
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Get per-key retry backoff cap duration
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_secs(self.retry_max_delay_secs)
    }

    /// Get cache sync timeout duration
    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_sync_timeout_secs)
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.sync_burst, 4);
        assert!((config.sync_rate_qps - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(5));
        assert_eq!(config.retry_max_delay(), Duration::from_secs(1000));
        assert!(config.json_logs());
    }

    #[test]
    fn test_sanitized_rejects_non_positive_rate() {
        let config = ControllerConfig {
            sync_rate_qps: 0.0,
            sync_burst: 0,
            retry_base_delay_ms: 0,
            ..ControllerConfig::default()
        }
        .sanitized();
        assert!(config.sync_rate_qps > 0.0);
        assert_eq!(config.sync_burst, 1);
        assert_eq!(config.retry_base_delay_ms, 1);
    }
}
