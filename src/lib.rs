//! External Secrets Controller Library
//!
//! Reconciles `ExternalSecret` declarations: values are fetched from an
//! external store (Vault, AWS Secrets Manager), optionally reshaped by
//! templates, and merged into a Kubernetes Secret.
//!
//! ## Quick Start
//!
//! ```rust
//! use external_secrets_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod utils;
