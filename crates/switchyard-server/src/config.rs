//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_settings::ServerSettings;

/// Configuration for [`SwitchyardServer`](crate::server::SwitchyardServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Route of the WebSocket endpoint.
    pub endpoint_path: String,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Close the older connection when an identity reconnects.
    pub close_superseded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            endpoint_path: "/ws-endpoint".into(),
            max_message_size: 1024 * 1024, // 1 MB
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            close_superseded: true,
        }
    }
}

impl ServerConfig {
    /// Ping cadence and pong deadline for session loops.
    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            timeout: Duration::from_secs(self.heartbeat_timeout_secs),
        }
    }
}

impl From<ServerSettings> for ServerConfig {
    fn from(settings: ServerSettings) -> Self {
        Self {
            host: settings.host,
            port: settings.port,
            endpoint_path: settings.endpoint_path,
            max_message_size: settings.max_message_size,
            send_queue_capacity: settings.send_queue_capacity.max(1),
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
            close_superseded: settings.close_superseded,
        }
    }
}

/// Heartbeat timing for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between server Ping frames.
    pub interval: Duration,
    /// Silence after which the peer is considered gone.
    pub timeout: Duration,
}
