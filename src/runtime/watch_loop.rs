//! # Watch Loop
//!
//! Controller watch loop over ExternalSecrets. Besides the declarations
//! themselves it watches:
//!
//! - target Secrets owned by a declaration, so edits to them are reverted
//! - SecretStores and ClusterSecretStores, so a store fix re-triggers every
//!   declaration that references it

use crate::config::ControllerConfig;
use crate::constants::{CONTROLLER_NAME, MANAGED_BY_LABEL};
use crate::controller::reconciler::{reconcile, resource_key, Reconciler};
use crate::crd::{ClusterSecretStore, ExternalSecret, SecretStore, StoreKind};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::runtime::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::{Client, ResourceExt};
use kube_runtime::controller::{self, Controller};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::watcher;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Declarations in the cache that reference the given store
#[must_use]
pub fn referencing_declarations(
    cache: &Store<ExternalSecret>,
    kind: StoreKind,
    store_name: &str,
    store_namespace: Option<&str>,
) -> Vec<ObjectRef<ExternalSecret>> {
    cache
        .state()
        .iter()
        .filter(|es| {
            let store_ref = &es.spec.secret_store_ref;
            store_ref.kind == kind
                && store_ref.name == store_name
                && (store_namespace.is_none() || es.namespace().as_deref() == store_namespace)
        })
        .map(|es| ObjectRef::from_obj(es.as_ref()))
        .collect()
}

/// Backoff keys of every declaration currently in the cache
#[must_use]
pub fn live_resource_keys(cache: &Store<ExternalSecret>) -> HashSet<String> {
    cache
        .state()
        .iter()
        .map(|es| resource_key(es.as_ref()))
        .collect()
}

/// Run the controller until a shutdown signal arrives
///
/// The watch is restarted when its stream ends for any other reason.
///
/// # Errors
///
/// Currently never; kept fallible for the binary edge.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_ms = Arc::new(AtomicU64::new(config.backoff_start_secs * 1000));
    let max_backoff_ms = config.backoff_max_secs * 1000;
    let restart_delay = config.watch_restart_delay_secs;

    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, waiting for in-flight reconciliations to complete...");
        shutdown_state.set_ready(false);
    });

    server_state.set_ready(true);

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );
        info!("Starting controller watch loop...");

        let declarations: Api<ExternalSecret> = Api::all(client.clone());
        let controller = Controller::new(declarations, watcher::Config::default().any_semantic());
        let cache = controller.store();
        let cluster_cache = cache.clone();
        let live_cache = cache.clone();
        let pruning = Arc::clone(&reconciler);

        let managed_secrets = watcher::Config::default()
            .labels(&format!("{MANAGED_BY_LABEL}={CONTROLLER_NAME}"));
        let backoff = Arc::clone(&backoff_ms);

        controller
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .owns(Api::<Secret>::all(client.clone()), managed_secrets)
            .watches(
                Api::<SecretStore>::all(client.clone()),
                watcher::Config::default(),
                move |store: SecretStore| {
                    referencing_declarations(
                        &cache,
                        StoreKind::SecretStore,
                        &store.name_any(),
                        store.namespace().as_deref(),
                    )
                },
            )
            .watches(
                Api::<ClusterSecretStore>::all(client.clone()),
                watcher::Config::default(),
                move |store: ClusterSecretStore| {
                    referencing_declarations(
                        &cluster_cache,
                        StoreKind::ClusterSecretStore,
                        &store.name_any(),
                        None,
                    )
                },
            )
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |result| {
                let backoff = Arc::clone(&backoff);
                let live_cache = live_cache.clone();
                let pruning = Arc::clone(&pruning);
                async move {
                    match result {
                        Ok((object, _action)) => {
                            debug!(resource = %object.name, "watch.event.reconciled");
                            Some(())
                        }
                        Err(controller::Error::ObjectNotFound(object)) => {
                            // A requeue fired for a declaration that is gone
                            let live = live_resource_keys(&live_cache);
                            let pruned = pruning.prune_backoff(|key| live.contains(key));
                            debug!(resource = %object.name, pruned, "watch.event.object_gone");
                            Some(())
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff_ms,
                                restart_delay,
                            )
                            .await
                        }
                    }
                }
            })
            .for_each(|()| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay
        );
        tokio::time::sleep(config.watch_restart_delay()).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ExternalSecretSpec, SecretStoreRef};
    use kube_runtime::reflector::store::Writer;

    fn declaration(namespace: &str, name: &str, kind: StoreKind, store: &str) -> ExternalSecret {
        let mut es = ExternalSecret::new(
            name,
            ExternalSecretSpec {
                secret_store_ref: SecretStoreRef {
                    name: store.to_string(),
                    kind,
                },
                target: crate::crd::ExternalSecretTarget::default(),
                refresh_interval: "1h".to_string(),
                data: Vec::new(),
            },
        );
        es.metadata.namespace = Some(namespace.to_string());
        es
    }

    fn cache_of(declarations: Vec<ExternalSecret>) -> Store<ExternalSecret> {
        let mut writer = Writer::<ExternalSecret>::default();
        for es in declarations {
            writer.apply_watcher_event(&watcher::Event::Apply(es));
        }
        writer.as_reader()
    }

    fn names(mut refs: Vec<ObjectRef<ExternalSecret>>) -> Vec<String> {
        refs.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        refs.into_iter()
            .map(|r| format!("{}/{}", r.namespace.unwrap_or_default(), r.name))
            .collect()
    }

    #[test]
    fn test_namespaced_store_only_maps_its_namespace() {
        let cache = cache_of(vec![
            declaration("apps", "db", StoreKind::SecretStore, "vault"),
            declaration("apps", "api", StoreKind::SecretStore, "aws"),
            declaration("other", "db", StoreKind::SecretStore, "vault"),
            declaration("apps", "shared", StoreKind::ClusterSecretStore, "vault"),
        ]);

        let refs = referencing_declarations(&cache, StoreKind::SecretStore, "vault", Some("apps"));

        assert_eq!(names(refs), vec!["apps/db".to_string()]);
    }

    #[test]
    fn test_live_resource_keys_follow_the_cache() {
        let cache = cache_of(vec![
            declaration("apps", "db", StoreKind::SecretStore, "vault"),
            declaration("other", "db", StoreKind::ClusterSecretStore, "vault"),
        ]);

        let live = live_resource_keys(&cache);

        assert_eq!(live.len(), 2);
        assert!(live.contains("apps/db"));
        assert!(live.contains("other/db"));
        assert!(!live.contains("apps/gone"));
    }

    #[test]
    fn test_cluster_store_maps_every_namespace() {
        let cache = cache_of(vec![
            declaration("apps", "db", StoreKind::ClusterSecretStore, "vault"),
            declaration("other", "db", StoreKind::ClusterSecretStore, "vault"),
            declaration("apps", "local", StoreKind::SecretStore, "vault"),
        ]);

        let refs = referencing_declarations(&cache, StoreKind::ClusterSecretStore, "vault", None);

        assert_eq!(
            names(refs),
            vec!["apps/db".to_string(), "other/db".to_string()]
        );
    }
}
