//! HTTP API handlers.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{error, info};

use super::listener::{ListenerRole, VERSION};
use crate::collector::MetricsCollector;
use crate::telemetry;

/// State handed to one listener's handlers.
#[derive(Clone)]
pub struct AppState {
    /// Which listener this state belongs to.
    pub role: ListenerRole,
    /// Snapshot source for `/metrics`.
    pub collector: MetricsCollector,
    /// Prometheus render handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("role", &self.role)
            .field("collector", &self.collector)
            .field("prometheus", &self.prometheus.is_some())
            .finish()
    }
}

impl AppState {
    /// Create state for a listener reading the live machine.
    pub fn new(role: ListenerRole) -> Self {
        Self::with_collector(role, MetricsCollector::live())
    }

    /// Create state with a specific collector.
    pub fn with_collector(role: ListenerRole, collector: MetricsCollector) -> Self {
        Self {
            role,
            collector,
            prometheus: None,
        }
    }

    /// Attach a Prometheus render handle.
    pub fn with_prometheus(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.prometheus = handle;
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Listener-specific status literal.
    pub status: &'static str,
}

/// Version response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VersionInfo {
    /// Service version.
    pub version: &'static str,
}

/// Root response: a message plus a list keyed by the listener's category.
#[derive(Debug, PartialEq, Eq)]
pub struct RootInfo {
    /// Greeting.
    pub message: String,
    /// Key of the list (`endpoints`, `services`, `admin`).
    pub category: &'static str,
    /// List contents.
    pub items: &'static [&'static str],
}

impl Serialize for RootInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry(self.category, self.items)?;
        map.end()
    }
}

/// Error body for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Short description.
    pub error: String,
    /// Underlying cause.
    pub details: String,
}

/// Logs the listener identity for every request, then always calls through.
pub async fn log_request(State(role): State<ListenerRole>, request: Request, next: Next) -> Response {
    info!(listener = %role, port = role.spec().conventional_port, "Request received on {}", role);
    telemetry::inc_http_requests(role.as_str());
    next.run(request).await
}

/// Root handler - listener message and category list.
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let spec = state.role.spec();
    Json(RootInfo {
        message: spec.message(),
        category: spec.category,
        items: spec.items,
    })
}

/// Health check handler - always returns 200 with the listener's status literal.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthStatus {
            status: state.role.spec().status,
        }),
    )
}

/// Version handler.
pub async fn version() -> impl IntoResponse {
    Json(VersionInfo { version: VERSION })
}

/// Metrics handler - fresh snapshot, or 500 when collection fails.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let collector = state.collector.clone();
    let result = tokio::task::spawn_blocking(move || collector.collect()).await;

    let details = match result {
        Ok(Ok(snapshot)) => return Json(snapshot).into_response(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("collector task failed: {}", e),
    };

    error!(listener = %state.role, "Error collecting metrics: {}", details);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Failed to collect metrics".to_string(),
            details,
        }),
    )
        .into_response()
}

/// Prometheus exposition of the service's own counters.
pub async fn prometheus(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_info_uses_category_as_key() {
        let spec = ListenerRole::Admin.spec();
        let root = RootInfo {
            message: spec.message(),
            category: spec.category,
            items: spec.items,
        };
        assert_eq!(
            serde_json::to_value(root).unwrap(),
            serde_json::json!({
                "message": "Hello from port 9000!",
                "admin": ["config", "system-info"],
            })
        );
    }

    #[test]
    fn app_state_without_prometheus_by_default() {
        let state = AppState::new(ListenerRole::Metrics);
        assert!(state.prometheus.is_none());
        assert_eq!(state.role, ListenerRole::Metrics);
    }
}
