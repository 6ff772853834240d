//! Per-invocation context handed to topic handlers.

use std::sync::Arc;

use serde::Serialize;
use switchyard_core::{ClientId, DispatchError};

use crate::websocket::connection::ClientConnection;
use crate::websocket::outbound::Outbound;

/// What a handler can see and do while handling one frame.
#[derive(Clone)]
pub struct TopicContext {
    /// Topic being handled.
    pub topic: String,
    /// Connection the frame arrived on.
    pub connection: Arc<ClientConnection>,
    /// Outbound API for replies and pushes to other clients.
    pub outbound: Outbound,
}

impl TopicContext {
    /// Create a context.
    pub fn new(topic: impl Into<String>, connection: Arc<ClientConnection>, outbound: Outbound) -> Self {
        Self {
            topic: topic.into(),
            connection,
            outbound,
        }
    }

    /// Effective identity of the calling client.
    pub fn client_id(&self) -> ClientId {
        self.connection.client_id()
    }

    /// Send `{destination, body}` back to the calling connection.
    pub fn reply<T>(&self, destination: &str, body: &T) -> Result<(), DispatchError>
    where
        T: Serialize + ?Sized,
    {
        self.outbound
            .send_to_session(&self.connection, destination, body)
    }
}
