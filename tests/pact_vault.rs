//! Pact contract tests for the Vault HTTP API
//!
//! These tests run the real Vault client against a Pact mock server:
//! 1. Define the expected Vault interactions
//! 2. Point a `VaultConnection` at the mock server
//! 3. Authenticate and read through the provider API
//! 4. Check the payload or the mapped error

mod common;

use common::{init_rustls, resolver_for, ExternalSecretBuilder, Harness, InMemoryCluster};
use external_secrets_controller::crd::{
    RemoteReference, SecretKeySelector, SecretStoreProvider, SecretStoreSpec, VaultAppRole,
    VaultAuth, VaultCertAuth, VaultKvVersion, VaultProvider,
};
use external_secrets_controller::provider::vault::{VaultAuthStrategy, VaultConnection};
use external_secrets_controller::provider::{ProviderClient, ProviderError};
use pact_consumer::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

const CONSUMER: &str = "External-Secrets-Controller";
const PROVIDER: &str = "Vault";
const CLIENT_CERT: &[u8] = include_bytes!("fixtures/client.crt");
const CLIENT_KEY: &[u8] = include_bytes!("fixtures/client.key");

fn base_url(mock_server: &dyn ValidatingMockServer) -> String {
    let mut base_url = mock_server.url().to_string();
    if base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

fn connection(server: &str, mount: &str, version: VaultKvVersion) -> VaultConnection {
    VaultConnection {
        server: server.to_string(),
        mount: mount.to_string(),
        version,
        ca_pem: None,
        namespace: None,
        timeout: Duration::from_secs(5),
    }
}

fn token(value: &str) -> VaultAuthStrategy {
    VaultAuthStrategy::Token {
        token: Zeroizing::new(value.to_string()),
    }
}

fn kv2_body(data: &Value) -> Value {
    json!({
        "data": {
            "data": data,
            "metadata": {
                "created_time": "2024-01-01T00:00:00Z",
                "version": 3
            }
        }
    })
}

fn db_creds() -> Value {
    json!({ "username": "admin", "password": "s3cr3t" })
}

/// Read `app/db` from KV v2 with the given token
fn kv2_read_interaction(builder: &mut PactBuilder, token: &str) {
    let description = format!("read app/db with token {token}");
    builder.interaction(description.as_str(), "", |mut i| {
        i.given("app/db exists in the secret mount");
        i.request
            .method("GET")
            .path("/v1/secret/data/app/db")
            .header("X-Vault-Token", token);
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(kv2_body(&db_creds()));
        i
    });
}

fn parse(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).expect("payload is JSON")
}

#[tokio::test]
async fn test_kv2_read_with_token() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    kv2_read_interaction(&mut pact_builder, "s.static-token");

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = token("s.static-token")
        .authenticate(connection(&base_url(&*mock_server), "secret", VaultKvVersion::V2))
        .await
        .expect("token auth needs no round trip");

    let payload = client.fetch(&RemoteReference::new("app/db")).await.unwrap();

    assert_eq!(parse(&payload), db_creds());
    assert_eq!(client.auth_method(), "token");
}

#[tokio::test]
async fn test_kv2_read_specific_version() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    pact_builder.interaction("read version 2 of app/db", "", |mut i| {
        i.given("app/db has at least two versions");
        i.request
            .method("GET")
            .path("/v1/secret/data/app/db")
            .query_param("version", "2")
            .header("X-Vault-Token", "s.static-token");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(kv2_body(&json!({ "password": "previous" })));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = token("s.static-token")
        .authenticate(connection(&base_url(&*mock_server), "secret", VaultKvVersion::V2))
        .await
        .unwrap();

    let remote = RemoteReference {
        version: Some("2".to_string()),
        ..RemoteReference::new("app/db")
    };
    let payload = client.fetch(&remote).await.unwrap();

    assert_eq!(parse(&payload), json!({ "password": "previous" }));
}

#[tokio::test]
async fn test_kv1_read_with_namespace() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    pact_builder.interaction("read app/db from a KV v1 mount", "", |mut i| {
        i.given("app/db exists in the kv mount");
        i.request
            .method("GET")
            .path("/v1/kv/app/db")
            .header("X-Vault-Token", "s.static-token")
            .header("X-Vault-Namespace", "team-a");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "data": db_creds(),
                "lease_duration": 2_764_800
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let mut conn = connection(&base_url(&*mock_server), "kv", VaultKvVersion::V1);
    conn.namespace = Some("team-a".to_string());
    let client = token("s.static-token").authenticate(conn).await.unwrap();

    let payload = client.fetch(&RemoteReference::new("app/db")).await.unwrap();

    assert_eq!(parse(&payload), db_creds());
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    pact_builder.interaction("read a missing secret", "", |mut i| {
        i.given("app/missing does not exist");
        i.request
            .method("GET")
            .path("/v1/secret/data/app/missing")
            .header("X-Vault-Token", "s.static-token");
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({ "errors": [] }));
        i
    });
    pact_builder.interaction("read a forbidden secret", "", |mut i| {
        i.given("the token policy does not cover app/forbidden");
        i.request
            .method("GET")
            .path("/v1/secret/data/app/forbidden")
            .header("X-Vault-Token", "s.static-token");
        i.response
            .status(403)
            .header("content-type", "application/json")
            .json_body(json!({ "errors": ["1 error occurred:\n\t* permission denied\n\n"] }));
        i
    });
    pact_builder.interaction("read while vault is sealed", "", |mut i| {
        i.given("vault is sealed");
        i.request
            .method("GET")
            .path("/v1/secret/data/app/sealed")
            .header("X-Vault-Token", "s.static-token");
        i.response
            .status(503)
            .header("content-type", "application/json")
            .json_body(json!({ "errors": ["Vault is sealed"] }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = token("s.static-token")
        .authenticate(connection(&base_url(&*mock_server), "secret", VaultKvVersion::V2))
        .await
        .unwrap();

    assert_eq!(
        client.fetch(&RemoteReference::new("app/missing")).await,
        Err(ProviderError::key_not_found("app/missing"))
    );
    assert!(matches!(
        client.fetch(&RemoteReference::new("app/forbidden")).await,
        Err(ProviderError::Unauthorized(msg)) if msg.contains("permission denied")
    ));
    assert!(matches!(
        client.fetch(&RemoteReference::new("app/sealed")).await,
        Err(ProviderError::Unavailable(msg)) if msg.contains("sealed")
    ));
}

/// AppRole login followed by a read with the issued token
fn approle_interactions(builder: &mut PactBuilder) {
    builder.interaction("approle login", "", |mut i| {
        i.given("role app-reader exists");
        i.request
            .method("POST")
            .path("/v1/auth/approle/login")
            .json_body(json!({
                "role_id": "app-reader",
                "secret_id": "approle-secret-id"
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "auth": {
                    "client_token": "s.approle-token",
                    "lease_duration": 3600,
                    "renewable": true
                }
            }));
        i
    });
    kv2_read_interaction(builder, "s.approle-token");
}

/// Certificate login followed by a read with the issued token
fn cert_interactions(builder: &mut PactBuilder) {
    builder.interaction("certificate login", "", |mut i| {
        i.given("the client certificate is trusted by the cert auth method");
        i.request
            .method("POST")
            .path("/v1/auth/cert/login")
            .json_body(json!({}));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "auth": {
                    "client_token": "s.cert-token",
                    "lease_duration": 3600,
                    "renewable": true
                }
            }));
        i
    });
    kv2_read_interaction(builder, "s.cert-token");
}

#[tokio::test]
async fn test_approle_login_then_read() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    approle_interactions(&mut pact_builder);

    let mock_server = pact_builder.start_mock_server(None, None);
    let strategy = VaultAuthStrategy::AppRole {
        mount: "approle".to_string(),
        role_id: "app-reader".to_string(),
        secret_id: Zeroizing::new("approle-secret-id".to_string()),
    };
    let client = strategy
        .authenticate(connection(&base_url(&*mock_server), "secret", VaultKvVersion::V2))
        .await
        .unwrap();

    let payload = client.fetch(&RemoteReference::new("app/db")).await.unwrap();

    assert_eq!(parse(&payload), db_creds());
    assert_eq!(client.auth_method(), "appRole");
}

#[tokio::test]
async fn test_cert_login_then_read() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    cert_interactions(&mut pact_builder);

    let mock_server = pact_builder.start_mock_server(None, None);
    let strategy = VaultAuthStrategy::Certificate {
        cert_pem: Zeroizing::new(CLIENT_CERT.to_vec()),
        key_pem: Zeroizing::new(CLIENT_KEY.to_vec()),
    };
    let client = strategy
        .authenticate(connection(&base_url(&*mock_server), "secret", VaultKvVersion::V2))
        .await
        .unwrap();

    let payload = client.fetch(&RemoteReference::new("app/db")).await.unwrap();

    assert_eq!(parse(&payload), db_creds());
    assert_eq!(client.auth_method(), "cert");
}

#[tokio::test]
async fn test_rejected_approle_login_is_unauthorized() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);
    pact_builder.interaction("approle login with a wrong secret id", "", |mut i| {
        i.given("role app-reader exists");
        i.request
            .method("POST")
            .path("/v1/auth/approle/login")
            .json_body(json!({
                "role_id": "app-reader",
                "secret_id": "wrong"
            }));
        i.response
            .status(400)
            .header("content-type", "application/json")
            .json_body(json!({ "errors": ["invalid role or secret ID"] }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let strategy = VaultAuthStrategy::AppRole {
        mount: "approle".to_string(),
        role_id: "app-reader".to_string(),
        secret_id: Zeroizing::new("wrong".to_string()),
    };
    let err = strategy
        .authenticate(connection(&base_url(&*mock_server), "secret", VaultKvVersion::V2))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Unauthorized(msg) if msg.contains("invalid role")));
}

// ============================================================================
// Auth symmetry through the full engine
// ============================================================================

fn vault_store(server: &str, auth: VaultAuth) -> SecretStoreSpec {
    SecretStoreSpec {
        controller: None,
        provider: SecretStoreProvider {
            vault: Some(VaultProvider {
                server: server.to_string(),
                path: "secret".to_string(),
                version: VaultKvVersion::V2,
                ca_bundle: None,
                namespace: None,
                auth,
            }),
            ..SecretStoreProvider::default()
        },
    }
}

/// Sync one ExternalSecret through a store and return the written target data
async fn sync_through(cluster: &Arc<InMemoryCluster>) -> BTreeMap<String, String> {
    let resolver = resolver_for(cluster);
    let h = Harness::new(Arc::new(resolver));
    let es = ExternalSecretBuilder::new("apps", "db")
        .data_ref(
            "username",
            RemoteReference {
                property: Some("username".to_string()),
                ..RemoteReference::new("app/db")
            },
        )
        .data_ref(
            "password",
            RemoteReference {
                property: Some("password".to_string()),
                ..RemoteReference::new("app/db")
            },
        )
        .build();
    h.declarations.store(&es);
    h.engine.run(&es).await.expect("sync succeeds");
    h.targets.string_data("apps", "db")
}

#[tokio::test]
async fn test_every_auth_method_writes_the_same_record() {
    init_rustls();

    let mut token_pact = PactBuilder::new(CONSUMER, PROVIDER);
    kv2_read_interaction(&mut token_pact, "s.static-token");
    let token_server = token_pact.start_mock_server(None, None);
    let token_cluster = Arc::new(InMemoryCluster::default());
    token_cluster.add_secret("apps", "vault-token", &[("token", b"s.static-token\n")]);
    token_cluster.add_store(
        "apps",
        "store",
        vault_store(
            &base_url(&*token_server),
            VaultAuth {
                token_secret_ref: Some(SecretKeySelector::new("vault-token", "token")),
                ..VaultAuth::default()
            },
        ),
    );

    let mut approle_pact = PactBuilder::new(CONSUMER, PROVIDER);
    approle_interactions(&mut approle_pact);
    let approle_server = approle_pact.start_mock_server(None, None);
    let approle_cluster = Arc::new(InMemoryCluster::default());
    approle_cluster.add_secret("apps", "approle", &[("secret-id", b"approle-secret-id")]);
    approle_cluster.add_store(
        "apps",
        "store",
        vault_store(
            &base_url(&*approle_server),
            VaultAuth {
                app_role: Some(VaultAppRole {
                    path: "approle".to_string(),
                    role_id: "app-reader".to_string(),
                    secret_ref: SecretKeySelector::new("approle", "secret-id"),
                }),
                ..VaultAuth::default()
            },
        ),
    );

    let mut cert_pact = PactBuilder::new(CONSUMER, PROVIDER);
    cert_interactions(&mut cert_pact);
    let cert_server = cert_pact.start_mock_server(None, None);
    let cert_cluster = Arc::new(InMemoryCluster::default());
    cert_cluster.add_secret(
        "apps",
        "vault-client",
        &[("tls.crt", CLIENT_CERT), ("tls.key", CLIENT_KEY)],
    );
    cert_cluster.add_store(
        "apps",
        "store",
        vault_store(
            &base_url(&*cert_server),
            VaultAuth {
                cert: Some(VaultCertAuth {
                    client_cert: SecretKeySelector::new("vault-client", "tls.crt"),
                    secret_ref: SecretKeySelector::new("vault-client", "tls.key"),
                }),
                ..VaultAuth::default()
            },
        ),
    );

    let by_token = sync_through(&token_cluster).await;
    let by_approle = sync_through(&approle_cluster).await;
    let by_cert = sync_through(&cert_cluster).await;

    assert_eq!(by_token.get("username").map(String::as_str), Some("admin"));
    assert_eq!(by_token.get("password").map(String::as_str), Some("s3cr3t"));
    assert_eq!(by_token, by_approle);
    assert_eq!(by_token, by_cert);
}
