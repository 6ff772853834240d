//! Settings types.
//!
//! All structs use `#[serde(default)]` so a partial settings file only has to
//! name the keys it changes.

use serde::{Deserialize, Serialize};
use switchyard_core::logging::LogFormat;

use crate::errors::{Result, SettingsError};

/// Root settings document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchyardSettings {
    /// Network and WebSocket settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl SwitchyardSettings {
    /// Reject values that deserialize fine but cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()
    }
}

/// Server network and WebSocket settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP port (`0` picks a free port).
    pub port: u16,
    /// Path of the WebSocket endpoint.
    pub endpoint_path: String,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before sends fail.
    pub send_queue_capacity: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a Pong before the connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Close the older connection when a client reconnects under the same identity.
    pub close_superseded: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            endpoint_path: "/ws-endpoint".to_string(),
            max_message_size: 1024 * 1024,
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            close_superseded: true,
        }
    }
}

impl ServerSettings {
    fn validate(&self) -> Result<()> {
        if !self.endpoint_path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.endpointPath must start with '/', got '{}'",
                self.endpoint_path
            )));
        }
        if self.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// Output format implied by [`LoggingSettings::json`].
    pub fn format(&self) -> LogFormat {
        if self.json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}
