//! Outbound API: push envelopes to a connection or a client identity.
//!
//! Sends enqueue onto the connection's bounded channel and return at once.
//! There is no queuing for absent clients and no retry.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use switchyard_core::envelope;
use switchyard_core::errors::UNKNOWN_CLIENT;
use switchyard_core::DispatchError;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::registry::SessionRegistry;
use crate::metrics::{WS_DISPATCH_ERRORS_TOTAL, WS_SEND_FAILURES_TOTAL};

/// Cloneable handle for sending to connected clients.
#[derive(Clone)]
pub struct Outbound {
    sessions: Arc<SessionRegistry>,
}

impl Outbound {
    /// Create a handle over a session registry.
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// The registry used to resolve identities.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Encode `{destination, body}` and write it to `connection`.
    pub fn send_to_session<T>(
        &self,
        connection: &ClientConnection,
        destination: &str,
        body: &T,
    ) -> Result<(), DispatchError>
    where
        T: Serialize + ?Sized,
    {
        let frame = envelope::encode(destination, body)?;
        deliver(connection, destination, frame)
    }

    /// Resolve `client_id` and send to its live connection.
    ///
    /// Fails with [`DispatchError::UnknownClient`] when nothing is registered
    /// under that identity.
    pub fn send_to_client_id<T>(
        &self,
        client_id: &str,
        destination: &str,
        body: &T,
    ) -> Result<(), DispatchError>
    where
        T: Serialize + ?Sized,
    {
        let Some(connection) = self.sessions.resolve(client_id) else {
            counter!(WS_DISPATCH_ERRORS_TOTAL, "error_type" => UNKNOWN_CLIENT).increment(1);
            debug!(client_id, destination, "no live connection for client");
            return Err(DispatchError::UnknownClient {
                client_id: client_id.to_owned(),
            });
        };
        self.send_to_session(&connection, destination, body)
    }

    /// Send to every registered open connection.
    ///
    /// Returns how many connections accepted the frame. An unencodable body
    /// reaches nobody.
    pub fn broadcast<T>(&self, destination: &str, body: &T) -> usize
    where
        T: Serialize + ?Sized,
    {
        let frame = match envelope::encode(destination, body) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(destination, error = %e, "failed to encode broadcast");
                return 0;
            }
        };
        let connections = self.sessions.connections();
        let delivered = connections
            .iter()
            .filter(|conn| conn.is_open())
            .filter(|conn| deliver(conn, destination, frame.clone()).is_ok())
            .count();
        debug!(
            destination,
            recipients = connections.len(),
            delivered,
            "broadcast"
        );
        delivered
    }
}

fn deliver(connection: &ClientConnection, destination: &str, frame: String) -> Result<(), DispatchError> {
    connection.send(frame).inspect_err(|e| {
        counter!(WS_SEND_FAILURES_TOTAL).increment(1);
        debug!(
            connection_id = %connection.id,
            destination,
            error = %e,
            "outbound frame refused"
        );
    })
}
