//! # Reconciliation Entry Point
//!
//! Called by the controller for every ExternalSecret event. Failures are
//! returned untouched so the error policy can pick the requeue.

use super::types::Reconciler;
use super::SyncError;
use crate::crd::ExternalSecret;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::debug;

/// Key used for per-resource backoff bookkeeping
#[must_use]
pub fn resource_key(es: &ExternalSecret) -> String {
    format!(
        "{}/{}",
        es.namespace().unwrap_or_default(),
        es.name_any()
    )
}

/// Run one attempt and decide when to look at the declaration again
///
/// # Errors
///
/// The attempt's `SyncError`, handed to the error policy.
pub async fn reconcile(es: Arc<ExternalSecret>, ctx: Arc<Reconciler>) -> Result<Action, SyncError> {
    if es.metadata.deletion_timestamp.is_some() {
        // Owned targets go with the declaration through garbage collection
        debug!(resource = %resource_key(&es), "declaration is being deleted, skipping");
        ctx.reset_backoff(&resource_key(&es));
        return Ok(Action::await_change());
    }

    let report = ctx.engine.run(&es).await?;
    ctx.reset_backoff(&resource_key(&es));

    Ok(match report.refresh_interval {
        Some(interval) => Action::requeue(interval),
        None => Action::await_change(),
    })
}
