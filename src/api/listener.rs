//! Listener roles and their fixed route tables.

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

/// Service version reported by `/version`.
pub const VERSION: &str = "0.1.0";

/// The three independent listeners.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListenerRole {
    /// Public entry point; exposes `/version`.
    Gateway,
    /// Observability listener; exposes `/metrics`.
    Metrics,
    /// Admin listener.
    Admin,
}

/// Literal responses and route switches for one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSpec {
    /// Port the listener conventionally runs on. Used in the root message.
    pub conventional_port: u16,
    /// `/health` status literal.
    pub status: &'static str,
    /// Key of the list in the `/` response.
    pub category: &'static str,
    /// Items in the `/` response list.
    pub items: &'static [&'static str],
    /// Serve `/version`.
    pub version_enabled: bool,
    /// Serve `/metrics`.
    pub metrics_enabled: bool,
}

const GATEWAY: ListenerSpec = ListenerSpec {
    conventional_port: 8080,
    status: "healthy",
    category: "endpoints",
    items: &["/health", "/version"],
    version_enabled: true,
    metrics_enabled: false,
};

const METRICS: ListenerSpec = ListenerSpec {
    conventional_port: 8000,
    status: "operational",
    category: "services",
    items: &["metrics", "monitoring"],
    version_enabled: false,
    metrics_enabled: true,
};

const ADMIN: ListenerSpec = ListenerSpec {
    conventional_port: 9000,
    status: "running",
    category: "admin",
    items: &["config", "system-info"],
    version_enabled: false,
    metrics_enabled: false,
};

impl ListenerRole {
    /// Every role, in startup order.
    pub const ALL: [ListenerRole; 3] = [Self::Gateway, Self::Metrics, Self::Admin];

    /// Fixed route table for this role.
    pub fn spec(self) -> &'static ListenerSpec {
        match self {
            Self::Gateway => &GATEWAY,
            Self::Metrics => &METRICS,
            Self::Admin => &ADMIN,
        }
    }

    /// Environment variable holding this role's port.
    pub fn port_var(self) -> &'static str {
        match self {
            Self::Gateway => "GATEWAY_PORT",
            Self::Metrics => "METRICS_PORT",
            Self::Admin => "ADMIN_PORT",
        }
    }

    /// Name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl ListenerSpec {
    /// `/` response message.
    pub fn message(&self) -> String {
        format!("Hello from port {}!", self.conventional_port)
    }
}
