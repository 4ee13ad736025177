//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Name used as field manager and `app.kubernetes.io/managed-by` value
pub const CONTROLLER_NAME: &str = "external-secrets-controller";

/// Default exponential backoff starting value for transient failures (seconds)
pub const DEFAULT_BACKOFF_START_SECS: u64 = 5;

/// Default exponential backoff maximum value for transient failures (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Fixed requeue interval after a permanent failure (seconds)
/// Slow enough to not hammer a misconfigured backend, fast enough that a
/// credentials fix is picked up without a manual nudge
pub const DEFAULT_PERMANENT_FAILURE_REQUEUE_SECS: u64 = 600;

/// Per-call timeout for backend requests (seconds)
pub const DEFAULT_PROVIDER_CALL_TIMEOUT_SECS: u64 = 10;

/// Overall deadline for one reconcile attempt (seconds)
pub const DEFAULT_ATTEMPT_DEADLINE_SECS: u64 = 120;

/// Number of immediate retries when the target Secret write hits a conflict
pub const DEFAULT_WRITE_CONFLICT_RETRIES: u32 = 3;

/// Minimum refresh interval accepted on an ExternalSecret (seconds)
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 10;

/// Default refresh interval for ExternalSecrets that do not set one
pub const DEFAULT_REFRESH_INTERVAL: &str = "1h";

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default maximum number of concurrent reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Annotation mapping each writing declaration's UID to the keys it manages on a
/// target Secret (JSON object of string arrays)
pub const MANAGED_KEYS_ANNOTATION: &str = "external-secrets.io/managed-keys";

/// Standard managed-by label key
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Length of the random attempt id attached to reconcile spans
pub const ATTEMPT_ID_LENGTH: usize = 8;
