//! Service configuration loaded from environment variables.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::api::ListenerRole;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Listener Addresses ===
    /// Host address every listener binds to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Port for the gateway listener.
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// Port for the metrics listener.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Port for the admin listener.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    // === Lifecycle ===
    /// Upper bound on the graceful drain after a termination signal.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    // === Observability ===
    /// Install the Prometheus recorder for the service's own counters.
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    8000
}

fn default_admin_port() -> u16 {
    9000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            gateway_port: default_gateway_port(),
            metrics_port: default_metrics_port(),
            admin_port: default_admin_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            prometheus_enabled: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        self.bind_ip()?;

        let mut seen = HashSet::new();
        for role in ListenerRole::ALL {
            let port = self.port_for(role);
            if port == 0 {
                return Err(format!("{} must be non-zero", role.port_var()));
            }
            if !seen.insert(port) {
                return Err(format!("port {} is assigned to more than one listener", port));
            }
        }

        if self.shutdown_timeout_secs == 0 {
            return Err("SHUTDOWN_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Parsed bind host.
    pub fn bind_ip(&self) -> Result<IpAddr, String> {
        self.bind_host
            .parse()
            .map_err(|_| format!("BIND_HOST is not a valid IP address: {}", self.bind_host))
    }

    /// Configured port for a listener role.
    pub fn port_for(&self, role: ListenerRole) -> u16 {
        match role {
            ListenerRole::Gateway => self.gateway_port,
            ListenerRole::Metrics => self.metrics_port,
            ListenerRole::Admin => self.admin_port,
        }
    }

    /// Socket address a listener role binds to.
    pub fn addr_for(&self, role: ListenerRole) -> Result<SocketAddr, String> {
        Ok(SocketAddr::new(self.bind_ip()?, self.port_for(role)))
    }

    /// Drain timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        envy::from_iter(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_conventional_ports() {
        let config = from_pairs(&[]);
        assert_eq!(config.gateway_port, 8080);
        assert_eq!(config.metrics_port, 8000);
        assert_eq!(config.admin_port, 9000);
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert!(config.prometheus_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_ports() {
        let config = from_pairs(&[
            ("GATEWAY_PORT", "18080"),
            ("METRICS_PORT", "18000"),
            ("ADMIN_PORT", "19000"),
            ("BIND_HOST", "127.0.0.1"),
        ]);
        assert_eq!(
            config.addr_for(ListenerRole::Metrics).unwrap(),
            "127.0.0.1:18000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.port_for(ListenerRole::Admin), 19000);
    }

    #[test]
    fn validate_rejects_duplicate_ports() {
        let config = Config {
            admin_port: 8080,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_host() {
        let config = Config {
            bind_host: "not-an-ip".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = Config {
            shutdown_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_port() {
        let config = Config {
            gateway_port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
