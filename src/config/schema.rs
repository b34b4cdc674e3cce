//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the TURN balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Relay pool definition.
    pub turn: TurnConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Active endpoint selection settings.
    pub load_balancer: LoadBalancerConfig,

    /// Status API listener.
    pub web_api: WebApiConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Relay pool definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TurnConfig {
    /// Relay name -> address (host or IP). The addresses form the endpoint
    /// registry and must match the labels returned by Prometheus.
    pub address_mapping: BTreeMap<String, String>,
}

impl TurnConfig {
    /// Relay addresses in registry order.
    pub fn addresses(&self) -> Vec<String> {
        self.address_mapping.values().cloned().collect()
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// TCP port probed on every relay.
    pub port: u16,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive contrary probe results needed to flip a relay's status.
    pub success_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            port: 3478,
            interval_secs: 5,
            timeout_secs: 2,
            success_threshold: 3,
        }
    }
}

/// How the active relay is chosen each selection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Uniformly random healthy relay.
    Random,
    /// Relay with the lowest mean metric value over the lookback window.
    #[default]
    Prometheus,
}

/// Selection loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Selection strategy.
    pub algorithm: Algorithm,

    /// Selection interval in minutes.
    pub interval_minutes: u64,

    /// Lookback window in minutes. Also the minimum number of samples a relay
    /// needs to take part in the comparison (one sample per minute).
    pub duration_minutes: u64,

    /// Prometheus query timeout in seconds.
    pub timeout_secs: u64,

    /// Prometheus connection settings.
    pub prometheus: PrometheusConfig,
}

impl LoadBalancerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.duration_minutes.saturating_mul(60))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            interval_minutes: 5,
            duration_minutes: 5,
            timeout_secs: 10,
            prometheus: PrometheusConfig::default(),
        }
    }
}

/// Prometheus connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Base URL without port (e.g., "http://prometheus").
    pub endpoint: String,

    /// Prometheus HTTP port.
    pub port: u16,

    /// PromQL template. Every `%s` is replaced by the `|`-joined list of
    /// healthy relay addresses.
    pub query: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost".to_string(),
            port: 9090,
            query: String::new(),
        }
    }
}

/// Status API listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for WebApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}
