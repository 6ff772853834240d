//! Handshake resolution: turns upgrade-request metadata into connection
//! attributes.
//!
//! Never rejects. Admission control belongs to whatever sits in front of the
//! endpoint.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use switchyard_core::ClientId;
use switchyard_core::constants::{
    ATTR_CLIENT_UUID, ATTR_STARTED_AT, CLIENT_UUID_PARAM, format_attribute_time,
};
use tracing::debug;

/// Result of resolving one handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handshake {
    /// Client-supplied identity, when present and non-empty.
    pub client_uuid: Option<ClientId>,
    /// Attributes to attach to the new connection.
    pub attributes: HashMap<String, String>,
}

/// Resolve a handshake from the upgrade request's query parameters, in
/// request order.
///
/// When `clientUuid` is repeated, the first occurrence is used.
pub fn resolve_handshake(params: &[(String, String)]) -> Handshake {
    resolve_handshake_at(params, Utc::now())
}

/// Resolve a handshake with an explicit establishment time.
pub fn resolve_handshake_at(params: &[(String, String)], now: DateTime<Utc>) -> Handshake {
    let client_uuid = params
        .iter()
        .find(|(name, _)| name == CLIENT_UUID_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
        .map(|value| ClientId::from(value.as_str()));

    let mut attributes = HashMap::with_capacity(2);
    let _ = attributes.insert(ATTR_STARTED_AT.to_owned(), format_attribute_time(now));
    if let Some(ref id) = client_uuid {
        let _ = attributes.insert(ATTR_CLIENT_UUID.to_owned(), id.to_string());
    }

    debug!(
        client_uuid = client_uuid.as_deref().unwrap_or("-"),
        "handshake resolved"
    );

    Handshake {
        client_uuid,
        attributes,
    }
}
