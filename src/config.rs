//! Configuration module for the HTTP server.
//!
//! This module exposes the `ServerConfig` using a global singleton pattern
//! to allow easy access throughout the server code with [`config()`].
//!
//! The configuration can be loaded from a TOML file using [`ServerConfig::from_file()`].
//! If loading fails, a default configuration is used.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;
use std::time::Duration;

use crate::http::HttpVersion;

static CONFIG: OnceLock<ServerConfig> = OnceLock::new();

/// One configured listening socket and the wire protocol it serves
/// (§6 "optional list of (bind-address, protocol) pairs for listeners").
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    pub address: IpAddr,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "http".to_string()
}

/// Server configuration structure
/// This struct holds all configurable parameters for the HTTP server.
/// It can be deserialized from a TOML file or created with default values.
///
/// As [`Duration`] does not implement `Deserialize` by default,
/// a custom deserializer is provided for the timeout fields.
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub buffer_size: usize,

    pub http_version: HttpVersion,
    pub max_request_line_size: usize,
    pub max_uri_size: usize,
    pub max_header_size: usize,
    pub max_body_size: usize,

    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub write_timeout: Duration,

    pub static_files_root: String,

    pub server_name: String,

    /// Worker count bounding concurrent task resume-steps (§5, §6). Default 1.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Additional listeners beyond `(address, port)`, each with its own
    /// protocol tag. Empty by default — the primary `(address, port)` is
    /// always bound.
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,

    /// Idle-connection timeout. `None` disables the idle timer.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub idle_timeout: Option<Duration>,
}

fn default_worker_count() -> usize {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
            buffer_size: 4096,

            http_version: HttpVersion::V1_1,
            // §8 boundary: "Request line longer than 8 KiB -> reject with
            // 414" names the whole request line, not just the request-target,
            // so `max_uri_size` is raised to match rather than capping valid
            // 1 KiB-8 KiB lines below the request-line limit.
            max_uri_size: 8192,
            max_request_line_size: 8192,
            max_header_size: 8192,
            max_body_size: 1024 * 1024, // 1 MB

            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),

            static_files_root: "./static".to_string(),

            server_name: "netweave/0.1".to_string(),

            worker_count: default_worker_count(),
            listeners: Vec::new(),
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Loads the server configuration from a TOML file at the given path.
    /// If reading or deserialization fails, the default configuration is returned.
    pub fn from_file(path: &str) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("fail to read {}: {err}", path);
                log::warn!("falling back to default config");
                return ServerConfig::default();
            }
        };

        match toml::from_str::<ServerConfig>(content.as_str()) {
            Ok(server_config) => server_config,
            Err(err) => {
                log::warn!("fail to deserialize config file {}: {err}", path);
                log::warn!("falling back to default config");
                ServerConfig::default()
            }
        }
    }
}

pub fn set_config(cfg: ServerConfig) {
    CONFIG.set(cfg).expect("Config already set");
}

pub fn config() -> &'static ServerConfig {
    CONFIG.get().expect("Config not initialized")
}

/// Custom deserializer for `Duration` from floating point seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Ok(Duration::from_secs_f64(secs))
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs: Option<f64> = Option::deserialize(deserializer)?;
    Ok(secs.map(Duration::from_secs_f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_extra_listeners_and_one_worker() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.worker_count, 1);
        assert!(cfg.listeners.is_empty());
        assert_eq!(cfg.idle_timeout, None);
    }
}
