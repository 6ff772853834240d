//! WebSocket client connection state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use switchyard_core::constants::ATTR_CLIENT_UUID;
use switchyard_core::{ClientId, ConnectionId, DispatchError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle of a connection. Moves forward only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Handshake done, not yet registered.
    Connecting = 0,
    /// Registered and exchanging frames.
    Open = 1,
    /// Terminal.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Represents a connected WebSocket client.
pub struct ClientConnection {
    /// Transport-assigned connection ID.
    pub id: ConnectionId,
    /// Client-supplied identity, fixed at construction.
    client_uuid: Option<ClientId>,
    /// Effective identity, fixed at construction.
    client_id: ClientId,
    /// Handshake metadata and activity timestamps.
    attributes: Mutex<HashMap<String, String>>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<String>,
    state: AtomicU8,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages refused because the queue was full or closed.
    pub dropped_messages: AtomicU64,
    /// Cancelled to make the session loop close the socket.
    close: CancellationToken,
}

impl ClientConnection {
    /// Create a connection in the `Connecting` state.
    pub fn new(
        id: ConnectionId,
        tx: mpsc::Sender<String>,
        attributes: HashMap<String, String>,
    ) -> Self {
        let now = Instant::now();
        let client_uuid = attributes
            .get(ATTR_CLIENT_UUID)
            .filter(|value| !value.is_empty())
            .map(|value| ClientId::from(value.as_str()));
        let client_id = client_uuid
            .clone()
            .unwrap_or_else(|| ClientId::from(&id));
        Self {
            id,
            client_uuid,
            client_id,
            attributes: Mutex::new(attributes),
            tx,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            close: CancellationToken::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the connection is registered and not yet closed.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Move `Connecting` to `Open`. Returns `false` if that already happened
    /// or the connection is closed.
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closed`. Returns `true` only for the first call.
    pub fn mark_closed(&self) -> bool {
        self.state.swap(ConnectionState::Closed as u8, Ordering::AcqRel)
            != ConnectionState::Closed as u8
    }

    /// The client-supplied identity, if the handshake carried one.
    pub fn client_uuid(&self) -> Option<ClientId> {
        self.client_uuid.clone()
    }

    /// Effective identity: the client-supplied one, else the connection ID.
    ///
    /// Fixed for the lifetime of the connection; the session registry keys on it.
    pub fn client_id(&self) -> ClientId {
        self.client_id.clone()
    }

    /// Read one attribute.
    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.lock().get(key).cloned()
    }

    /// Set one attribute, replacing any previous value.
    ///
    /// `clientUuid` is read-only after the handshake; writes to it are ignored.
    pub fn set_attribute(&self, key: &str, value: String) {
        if key == ATTR_CLIENT_UUID {
            debug!(connection_id = %self.id, "ignoring write to client identity attribute");
            return;
        }
        let _ = self.attributes.lock().insert(key.to_owned(), value);
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> HashMap<String, String> {
        self.attributes.lock().clone()
    }

    /// Enqueue a text frame for the write task.
    ///
    /// Never blocks. Fails with [`DispatchError::SendFailed`] when the
    /// connection is closed or its queue is full; both count as a drop.
    pub fn send(&self, frame: String) -> Result<(), DispatchError> {
        if self.state() == ConnectionState::Closed {
            return Err(self.refuse("connection closed"));
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(self.refuse("send queue full")),
            Err(TrySendError::Closed(_)) => Err(self.refuse("connection closed")),
        }
    }

    fn refuse(&self, reason: &str) -> DispatchError {
        let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        DispatchError::SendFailed {
            connection_id: self.id.to_string(),
            reason: reason.to_owned(),
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Ask the session loop to close the socket.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_close_requested(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Token cancelled by [`close`](Self::close).
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("client_id", &self.client_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
