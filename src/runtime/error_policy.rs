//! # Error Policy
//!
//! Picks the requeue for a failed reconcile and classifies watch stream errors.

use crate::controller::reconciler::{resource_key, Reconciler, Severity, SyncError};
use crate::crd::ExternalSecret;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue decision for a failed attempt
///
/// - transient: exponential backoff per resource
/// - permanent: fixed slow requeue, a fix to the store or credentials is picked up eventually
/// - ignored: wait for the next change
pub fn handle_reconciliation_error(
    obj: Arc<ExternalSecret>,
    error: &SyncError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = resource_key(&obj);
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %obj.name_any(),
        resource.namespace = obj.namespace().as_deref().unwrap_or(""),
        error = %error
    );
    let _error_guard = error_span.enter();

    metrics::increment_reconciliation_errors(error.reason());

    match error.severity() {
        Severity::Transient => {
            let delay = ctx.next_backoff(&key);
            info!(
                retry_in_secs = delay.as_secs(),
                error_count = ctx.error_count(&key),
                "Retrying {} after transient failure",
                key
            );
            Action::requeue(delay)
        }
        Severity::Permanent => {
            error!(reason = error.reason(), "Reconciliation of {} failed: {}", key, error);
            Action::requeue(ctx.config.permanent_failure_requeue())
        }
        Severity::Ignored => {
            info!(reason = error.reason(), "Skipping {}: {}", key, error);
            Action::await_change()
        }
    }
}

/// Watch stream error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

/// Classify a stream error from its debug rendering
///
/// 404 is checked first since a plain-text 404 body surfaces as a watch failure
/// that also mentions other codes.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    if error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found")
    {
        WatchErrorKind::NotFound
    } else if error_string.contains("401") || error_string.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else {
        WatchErrorKind::Other
    }
}

/// Handle a watch stream error
///
/// Returns `None` to drop the event and let the watch restart, `Some(())` to keep going.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized), check the controller's ServiceAccount and RBAC"
            );
            warn!(
                "Waiting {}s before retrying watch",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
            None
        }
        WatchErrorKind::Throttled => {
            let current = backoff_ms.load(Ordering::Relaxed);
            warn!("API server throttling (429), backing off for {}ms", current);
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(
                current.saturating_mul(2).min(max_backoff_ms),
                Ordering::Relaxed,
            );
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404), normal when an object was deleted. Error: {}",
                error_string
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}
