//! Configuration for the relay node.
//!
//! Everything the original deployment kept in ambient globals (hostname,
//! numeric node id, the static host list, the shared listen port) lives in
//! one `Config` struct built at process start and passed by `Arc` into the
//! networking layer. A missing config file is not an error: every field has
//! a workable default, so a bare `fedrelayd` joins the federation as a
//! background node on the standard port range.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::RelayError;
use crate::network::PeerAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network identity advertised in every envelope and heartbeat.
    #[serde(default = "detect_hostname")]
    pub host: String,
    /// Small numeric identity mixed into event ids so duplicate arrivals
    /// from different nodes stay distinguishable.
    #[serde(default)]
    pub node_id: u8,
    /// Logical role tag used to select multicast recipients.
    #[serde(default = "default_class")]
    pub class: String,
    /// Human-readable origin label. Empty means "derive from class + host".
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port both transports listen on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Hostnames of every statically known federation machine.
    #[serde(default)]
    pub static_hosts: Vec<String>,
    /// Inclusive port range a peer process may be listening on.
    #[serde(default = "default_port_start")]
    pub port_start: u16,
    #[serde(default = "default_listen_port")]
    pub port_end: u16,
}

fn default_class() -> String {
    "BG".to_string()
}

fn default_listen_port() -> u16 {
    2504
}

fn default_port_start() -> u16 {
    2500
}

fn detect_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!("Hostname not found ({}), using localhost", e);
            "localhost".to_string()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: detect_hostname(),
            node_id: 0,
            class: default_class(),
            name: String::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            static_hosts: Vec::new(),
            port_start: default_port_start(),
            port_end: default_listen_port(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Config, RelayError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Config::default().normalized());
        }
        let raw = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| RelayError::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Fill in derived fields that depend on other fields.
    pub fn normalized(mut self) -> Config {
        if self.node.name.is_empty() {
            self.node.name = format!("{} relay@{}", self.node.class, self.node.host);
        }
        if self.network.port_end < self.network.port_start {
            self.network.port_end = self.network.port_start;
        }
        self
    }

    /// The broadcast fallback: every static host crossed with the port
    /// range, minus this process's own listen address.
    pub fn static_host_set(&self) -> Vec<PeerAddr> {
        let mut peers = Vec::new();
        for host in &self.network.static_hosts {
            for port in self.network.port_start..=self.network.port_end {
                if *host == self.node.host && port == self.network.listen_port {
                    continue;
                }
                peers.push(PeerAddr::new(host.clone(), port));
            }
        }
        peers
    }
}
