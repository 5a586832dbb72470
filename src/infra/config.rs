//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> (parsed by the binaries)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! The PORT environment variable overrides `server.port` after loading.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name, used as the metrics label
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { name: default_service_name() }
    }
}

fn default_service_name() -> String {
    "impressions".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_cors_allow_origin")]
    pub cors_allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            cors_allow_origin: default_cors_allow_origin(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_cors_allow_origin() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Interval for the periodic metrics log line (seconds)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: default_metrics_enabled(), interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalculationConfig {
    /// Interval output when a request does not say
    #[serde(default)]
    pub return_intervals_default: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub calculation: CalculationConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    service_name: String,
    bind_address: String,
    port: u16,
    max_body_bytes: usize,
    cors_allow_origin: String,
    metrics_enabled: bool,
    metrics_interval_secs: u64,
    return_intervals_default: bool,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            service_name: toml_config.service.name,
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            max_body_bytes: toml_config.server.max_body_bytes,
            cors_allow_origin: toml_config.server.cors_allow_origin,
            metrics_enabled: toml_config.metrics.enabled,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            return_intervals_default: toml_config.calculation.return_intervals_default,
            config_file,
        }
    }

    /// Config file path when no `--config` was given
    pub fn resolve_config_path() -> String {
        Self::config_path_from(env::var("CONFIG_FILE").ok())
    }

    fn config_path_from(config_file_env: Option<String>) -> String {
        config_file_env
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)
            .with_context(|| format!("Failed to parse config file {}", source))?;
        Ok(Self::from_toml(toml_config, source.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        let config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        };
        config.with_env_overrides()
    }

    /// Apply environment overrides (PORT)
    fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = env::var("PORT") {
            match raw.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!(port = %raw, "invalid_port_env_ignored"),
            }
        }
        self
    }

    // Getters for all config fields
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn cors_allow_origin(&self) -> &str {
        &self.cors_allow_origin
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn return_intervals_default(&self) -> bool {
        self.return_intervals_default
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to override the listening port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method for tests to override the default interval output
    #[cfg(test)]
    pub fn with_return_intervals_default(mut self, enabled: bool) -> Self {
        self.return_intervals_default = enabled;
        self
    }

    /// Builder method for tests to set the body limit
    #[cfg(test)]
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}
