//! # Runtime
//!
//! Long-running pieces of the controller binary: the watch loop, its error
//! policy and the HTTP server for health checks and metrics.

pub mod error_policy;
pub mod initialization;
pub mod server;
pub mod watch_loop;
