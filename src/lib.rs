//! Three independent HTTP listeners serving health, version, and metrics.
//!
//! Each listener has a fixed route table:
//!
//! ```text
//! gateway (8080)   /  /health  /version
//! metrics (8000)   /  /health  /metrics  /metrics/prometheus
//! admin   (9000)   /  /health
//! ```
//!
//! No state is shared between listeners. `/metrics` builds a fresh snapshot
//! of host, heap, and process state on every request.
//!
//! # Modules
//!
//! - [`api`]: Listener roles, route tables, and handlers
//! - [`collector`]: Host, heap, and process introspection
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`heap`]: Tracking global allocator
//! - [`server`]: Bind, serve, and shutdown of all listeners
//! - [`telemetry`]: Prometheus counters for the service itself
//! - [`utils`]: Signal handling

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod heap;
pub mod server;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use error::{Result, ServiceError};
