//! Dispatch error codes and error types.
//!
//! Every failure the dispatcher can hit is a [`DispatchError`] variant. All of
//! them are scoped to a single message: none closes the connection. Handlers
//! return [`HandlerError`], which the dispatcher folds into
//! [`DispatchError::HandlerFailure`].

use thiserror::Error;

// ── Error code constants ────────────────────────────────────────────

/// Inbound frame is not a JSON object with a string `destination`.
pub const MALFORMED_ENVELOPE: &str = "MALFORMED_ENVELOPE";
/// No handler registered for the destination.
pub const UNKNOWN_TOPIC: &str = "UNKNOWN_TOPIC";
/// Body does not match the handler's payload type.
pub const PAYLOAD_DECODE_ERROR: &str = "PAYLOAD_DECODE_ERROR";
/// Handler returned an error.
pub const HANDLER_FAILURE: &str = "HANDLER_FAILURE";
/// Connection is closed or its send queue is full.
pub const SEND_FAILED: &str = "SEND_FAILED";
/// No live connection for the client identity.
pub const UNKNOWN_CLIENT: &str = "UNKNOWN_CLIENT";
/// Outbound body could not be encoded.
pub const ENCODING_ERROR: &str = "ENCODING_ERROR";

/// Failure of one inbound or outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Frame could not be parsed into an envelope.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// What was wrong with the frame.
        reason: String,
    },

    /// Destination has no registered handler.
    #[error("no handler registered for topic '{topic}'")]
    UnknownTopic {
        /// The unmatched destination.
        topic: String,
    },

    /// Body could not be decoded into the handler's payload type.
    #[error("invalid body for topic '{topic}': {reason}")]
    PayloadDecode {
        /// Destination whose handler rejected the body.
        topic: String,
        /// Decoder message.
        reason: String,
    },

    /// Handler ran and failed.
    #[error("handler for topic '{topic}' failed: {message}")]
    HandlerFailure {
        /// Destination of the failing handler.
        topic: String,
        /// Handler's error message.
        message: String,
    },

    /// Frame could not be written to the connection.
    #[error("send to connection {connection_id} failed: {reason}")]
    SendFailed {
        /// Target connection.
        connection_id: String,
        /// Why the write was refused (closed, queue full).
        reason: String,
    },

    /// Outbound send addressed a client with no live connection.
    #[error("no live connection for client '{client_id}'")]
    UnknownClient {
        /// The unresolved identity.
        client_id: String,
    },

    /// Outbound body is not representable as JSON.
    #[error("failed to encode body: {reason}")]
    Encoding {
        /// Encoder message.
        reason: String,
    },
}

impl DispatchError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope { .. } => MALFORMED_ENVELOPE,
            Self::UnknownTopic { .. } => UNKNOWN_TOPIC,
            Self::PayloadDecode { .. } => PAYLOAD_DECODE_ERROR,
            Self::HandlerFailure { .. } => HANDLER_FAILURE,
            Self::SendFailed { .. } => SEND_FAILED,
            Self::UnknownClient { .. } => UNKNOWN_CLIENT,
            Self::Encoding { .. } => ENCODING_ERROR,
        }
    }
}

/// Error type returned by topic handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An outbound send made by the handler failed.
    #[error(transparent)]
    Outbound(#[from] DispatchError),

    /// Handler-specific failure.
    #[error("{message}")]
    Failed {
        /// Description.
        message: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
