//! # Controller
//!
//! Core controller modules for the External Secrets Controller.
//!
//! - `backoff`: Exponential backoff for transient failures
//! - `resolver`: Store lookup, provider selection and authentication
//! - `reconciler`: Per-ExternalSecret reconcile algorithm

pub mod backoff;
pub mod reconciler;
pub mod resolver;
