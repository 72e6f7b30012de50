//! Unified error types for the status service.

use std::net::SocketAddr;

use thiserror::Error;

use crate::api::ListenerRole;

/// Unified error type for the status service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A listener could not acquire its port.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Metrics collection error.
    #[error("collection error: {0}")]
    Collection(#[from] CollectionError),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A listener failed to bind. Fatal for the whole process.
#[derive(Error, Debug)]
#[error("failed to bind {role} listener on {addr}: {source}")]
pub struct BindError {
    /// Which listener failed.
    pub role: ListenerRole,
    /// Address it tried to bind.
    pub addr: SocketAddr,
    /// Underlying socket error.
    #[source]
    pub source: std::io::Error,
}

/// Errors raised while reading host, heap, or process state.
#[derive(Error, Debug)]
pub enum CollectionError {
    /// The OS refused to report the current pid.
    #[error("cannot determine current pid: {0}")]
    CurrentPid(String),

    /// The current process was not found in the process table.
    #[error("process {0} not found in process table")]
    ProcessNotFound(u32),

    /// The executable path could not be resolved.
    #[error("cannot resolve executable path: {0}")]
    ExecutablePath(#[source] std::io::Error),

    /// A `/proc` file could not be read.
    #[error("failed to read {path}: {source}")]
    ProcRead {
        /// File that failed.
        path: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A `/proc` file had an unexpected layout.
    #[error("failed to parse {path}: {reason}")]
    ProcParse {
        /// File that failed.
        path: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// The source is unavailable.
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        /// Which introspection source.
        source_name: &'static str,
        /// Why.
        reason: String,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServiceError>;
