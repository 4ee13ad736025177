//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller class this instance acts for
    /// Stores with a non-empty `spec.controller` are only processed when it matches
    pub controller_class: String,
    /// HTTP port for metrics and health checks
    pub metrics_port: u16,
    /// Exponential backoff starting value for transient failures (seconds)
    pub backoff_start_secs: u64,
    /// Exponential backoff maximum value for transient failures (seconds)
    pub backoff_max_secs: u64,
    /// Fixed requeue interval after permanent failures (seconds)
    pub permanent_failure_requeue_secs: u64,
    /// Timeout applied to each backend call (seconds)
    pub provider_call_timeout_secs: u64,
    /// Deadline for a whole reconcile attempt (seconds)
    pub attempt_deadline_secs: u64,
    /// Immediate retries on target write conflicts
    pub write_conflict_retries: u32,
    /// Minimum accepted refresh interval (seconds)
    pub min_refresh_interval_secs: u64,
    /// Maximum concurrent reconciliations
    /// Limits how many ExternalSecrets can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Watch stream restart delay after the stream ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            controller_class: String::new(),
            metrics_port: DEFAULT_METRICS_PORT,
            backoff_start_secs: DEFAULT_BACKOFF_START_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            permanent_failure_requeue_secs: DEFAULT_PERMANENT_FAILURE_REQUEUE_SECS,
            provider_call_timeout_secs: DEFAULT_PROVIDER_CALL_TIMEOUT_SECS,
            attempt_deadline_secs: DEFAULT_ATTEMPT_DEADLINE_SECS,
            write_conflict_retries: DEFAULT_WRITE_CONFLICT_RETRIES,
            min_refresh_interval_secs: MIN_REFRESH_INTERVAL_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            controller_class: env_var_or_default_str("CONTROLLER_CLASS", ""),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            backoff_start_secs: env_var_or_default("BACKOFF_START_SECS", DEFAULT_BACKOFF_START_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            permanent_failure_requeue_secs: env_var_or_default(
                "PERMANENT_FAILURE_REQUEUE_SECS",
                DEFAULT_PERMANENT_FAILURE_REQUEUE_SECS,
            ),
            provider_call_timeout_secs: env_var_or_default(
                "PROVIDER_CALL_TIMEOUT_SECS",
                DEFAULT_PROVIDER_CALL_TIMEOUT_SECS,
            ),
            attempt_deadline_secs: env_var_or_default(
                "ATTEMPT_DEADLINE_SECS",
                DEFAULT_ATTEMPT_DEADLINE_SECS,
            ),
            write_conflict_retries: env_var_or_default(
                "WRITE_CONFLICT_RETRIES",
                DEFAULT_WRITE_CONFLICT_RETRIES,
            ),
            min_refresh_interval_secs: env_var_or_default(
                "MIN_REFRESH_INTERVAL_SECS",
                MIN_REFRESH_INTERVAL_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get permanent failure requeue duration
    #[must_use]
    pub fn permanent_failure_requeue(&self) -> Duration {
        Duration::from_secs(self.permanent_failure_requeue_secs)
    }

    /// Get per-call provider timeout
    #[must_use]
    pub fn provider_call_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_call_timeout_secs)
    }

    /// Get the deadline for one reconcile attempt
    #[must_use]
    pub fn attempt_deadline(&self) -> Duration {
        Duration::from_secs(self.attempt_deadline_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
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
