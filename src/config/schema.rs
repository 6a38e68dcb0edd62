//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a valid config.

use serde::{Deserialize, Serialize};

use crate::chain::NodeClientConfig;

/// Root configuration for the sweeping agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SweeperConfig {
    /// Node and event stream endpoints.
    pub network: NetworkConfig,

    /// Event stream connection behaviour.
    pub listener: ListenerConfig,

    /// Sweep decisions and signing policy.
    pub sweep: SweepConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Node and event stream endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network selector, e.g. "testnet" or "mainnet".
    pub name: String,

    /// Overrides `https://{name}.aeternity.io`.
    pub node_url: Option<String>,

    /// Overrides `wss://{name}.aeternity.io/mdw/websocket`.
    pub ws_url: Option<String>,

    /// Extra node URLs tried in order when the primary fails.
    pub failover_urls: Vec<String>,

    /// Deadline for each node request.
    pub request_timeout_secs: u64,

    /// Relative TTL of submitted spends, in key blocks (0 = no expiry).
    pub ttl_blocks: u64,

    /// How long to wait for a submitted spend to be mined (0 = don't wait).
    pub confirm_timeout_secs: u64,

    pub confirm_poll_interval_ms: u64,

    /// HD account index of the sender key.
    pub account_index: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "testnet".to_string(),
            node_url: None,
            ws_url: None,
            failover_urls: Vec::new(),
            request_timeout_secs: 10,
            ttl_blocks: 0,
            confirm_timeout_secs: 60,
            confirm_poll_interval_ms: 2_000,
            account_index: 0,
        }
    }
}

impl NetworkConfig {
    pub fn node_url(&self) -> String {
        self.node_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.aeternity.io", self.name))
    }

    pub fn ws_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| format!("wss://{}.aeternity.io/mdw/websocket", self.name))
    }

    pub fn node_client_config(&self) -> NodeClientConfig {
        NodeClientConfig {
            node_url: self.node_url(),
            failover_urls: self.failover_urls.clone(),
            request_timeout_secs: self.request_timeout_secs,
            ttl_blocks: self.ttl_blocks,
            confirm_timeout_secs: self.confirm_timeout_secs,
            confirm_poll_interval_ms: self.confirm_poll_interval_ms,
        }
    }
}

/// Event stream connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Deadline for the WebSocket handshake.
    pub connect_timeout_secs: u64,

    /// Deadline for sending the subscription frame.
    pub subscribe_timeout_secs: u64,

    /// Reconnect when no frame arrives for this long (0 = never).
    pub idle_timeout_secs: u64,

    pub reconnect: ReconnectConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            subscribe_timeout_secs: 5,
            idle_timeout_secs: 0,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnect behaviour after the stream drops.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// When false the listener makes a single connection attempt.
    pub enabled: bool,

    /// Consecutive failed attempts before giving up (0 = unlimited).
    pub max_attempts: u32,

    pub base_delay_ms: u64,

    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 20,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Sweep behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Log the sender's mempool before each balance check.
    pub log_pending_transactions: bool,

    /// Log the recipient balance after each sweep.
    pub log_recipient_balance: bool,

    /// Refuse to sign anything not addressed to the configured recipient.
    pub restrict_to_recipient: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            log_pending_transactions: true,
            log_recipient_balance: true,
            restrict_to_recipient: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Directory receiving one `<start time>.log` file per run.
    pub logs_dir: String,

    /// Mirror logs to stderr in human-readable form.
    pub console: bool,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logs_dir: "ae-sender-logs".to_string(),
            console: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
