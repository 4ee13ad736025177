//! # CRD Generator
//!
//! Prints the CustomResourceDefinitions of the controller as a multi-document
//! YAML stream.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/external-secrets.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use external_secrets_controller::crd::{ClusterSecretStore, ExternalSecret, SecretStore};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        ExternalSecret::crd(),
        SecretStore::crd(),
        ClusterSecretStore::crd(),
    ];
    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
