//! Session registry: client identity to live connection.
//!
//! Last connect wins. A disconnect only removes the entry if it still points
//! at the disconnecting connection, so a stale close cannot evict the newer
//! connection that took over the identity.

use std::sync::Arc;

use dashmap::DashMap;
use switchyard_core::ClientId;
use tracing::debug;

use super::connection::ClientConnection;

/// Concurrent map of effective client identity to connection.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<ClientId, Arc<ClientConnection>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its effective identity.
    ///
    /// Returns the previously registered connection when a different one held
    /// the identity.
    pub fn on_connect(&self, connection: Arc<ClientConnection>) -> Option<Arc<ClientConnection>> {
        let client_id = connection.client_id();
        let previous = self.sessions.insert(client_id.clone(), Arc::clone(&connection))?;
        if Arc::ptr_eq(&previous, &connection) {
            return None;
        }
        debug!(
            %client_id,
            previous = %previous.id,
            current = %connection.id,
            "identity taken over by newer connection"
        );
        Some(previous)
    }

    /// Remove the entry for this connection's identity if it still maps here.
    ///
    /// Returns `true` when an entry was removed.
    pub fn on_disconnect(&self, connection: &ClientConnection) -> bool {
        let client_id = connection.client_id();
        self.sessions
            .remove_if(&client_id, |_, current| {
                std::ptr::eq(Arc::as_ptr(current), connection)
            })
            .is_some()
    }

    /// Live connection for an identity.
    pub fn resolve(&self, client_id: &str) -> Option<Arc<ClientConnection>> {
        self.sessions
            .get(client_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every registered connection.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Registered identities (sorted).
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Registered connections whose identity came from the handshake rather
    /// than the connection-id fallback.
    pub fn identified_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().client_uuid().is_some())
            .count()
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
