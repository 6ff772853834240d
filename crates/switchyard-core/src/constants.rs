//! Package-level constants and connection attribute helpers.

use chrono::{DateTime, Utc};

/// Current version (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "switchyard";

/// Handshake query parameter carrying the client's stable identity.
pub const CLIENT_UUID_PARAM: &str = "clientUuid";

/// Connection attribute: client-supplied identity.
pub const ATTR_CLIENT_UUID: &str = "clientUuid";
/// Connection attribute: when the handshake completed.
pub const ATTR_STARTED_AT: &str = "startedAt";
/// Connection attribute: when the last inbound frame was processed.
pub const ATTR_UPDATED_AT: &str = "updatedAt";
/// Connection attribute: when the connection closed.
pub const ATTR_DISCONNECTED_AT: &str = "disconnectedAt";

/// `chrono` format for attribute timestamps (`dd/MM/yyyy HH:mm:ss`).
pub const ATTRIBUTE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Format a timestamp for storage in a connection attribute.
pub fn format_attribute_time(at: DateTime<Utc>) -> String {
    at.format(ATTRIBUTE_TIME_FORMAT).to_string()
}

/// Current time formatted for a connection attribute.
pub fn attribute_now() -> String {
    format_attribute_time(Utc::now())
}
