//! Wire envelope and its JSON text codec.
//!
//! Every frame exchanged over the dispatcher's WebSocket is a JSON object:
//!
//! ```json
//! {"destination": "person.updated", "body": {"id": 7}}
//! ```
//!
//! `destination` is required and names the topic. `body` is optional. Inbound
//! clients send it string-encoded (`"body": "{\"id\":7}"`), while outbound
//! frames carry the structured value directly. [`Envelope::payload`] accepts
//! both shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DispatchError;

/// One `{destination, body}` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Topic name used for routing.
    pub destination: String,
    /// Optional payload. `Some(Value::Null)` is kept distinct from an absent body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(destination: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            destination: destination.into(),
            body,
        }
    }

    /// Whether the body is absent or JSON `null`.
    pub fn has_body(&self) -> bool {
        !matches!(self.body, None | Some(Value::Null))
    }

    /// Decode the body into `T`.
    ///
    /// Returns `Ok(None)` when the body is absent or `null`. A string body is
    /// first parsed as JSON text; when that fails it is offered to `T` as a
    /// plain JSON string, so `"body":"hi"` decodes into `String` as `"hi"`.
    /// Any other body is deserialized directly.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.body {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => match serde_json::from_str::<T>(text) {
                Ok(value) => Ok(Some(value)),
                Err(parse_err) => serde_json::from_value::<T>(Value::String(text.clone()))
                    .map(Some)
                    .map_err(|_| parse_err),
            },
            Some(other) => serde_json::from_value::<T>(other.clone()).map(Some),
        }
    }
}

/// Decode a raw text frame into an [`Envelope`].
///
/// Fails with [`DispatchError::MalformedEnvelope`] when the frame is not JSON,
/// is not an object, or lacks a string `destination`.
pub fn decode(raw: &str) -> Result<Envelope, DispatchError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| DispatchError::MalformedEnvelope {
        reason: format!("invalid JSON: {e}"),
    })?;

    let Value::Object(mut object) = value else {
        return Err(DispatchError::MalformedEnvelope {
            reason: "expected a JSON object".into(),
        });
    };

    let destination = match object.remove("destination") {
        Some(Value::String(destination)) => destination,
        Some(_) => {
            return Err(DispatchError::MalformedEnvelope {
                reason: "`destination` must be a string".into(),
            });
        }
        None => {
            return Err(DispatchError::MalformedEnvelope {
                reason: "missing `destination`".into(),
            });
        }
    };

    Ok(Envelope {
        destination,
        body: object.remove("body"),
    })
}

/// Encode `body` under `destination` as a JSON text frame.
///
/// Fails with [`DispatchError::Encoding`] when `body` cannot be represented
/// as JSON (e.g. a map with non-string keys).
pub fn encode<T: Serialize + ?Sized>(destination: &str, body: &T) -> Result<String, DispatchError> {
    let body = serde_json::to_value(body).map_err(|e| DispatchError::Encoding {
        reason: e.to_string(),
    })?;
    encode_envelope(&Envelope::new(destination, Some(body)))
}

/// Encode an already-built envelope.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, DispatchError> {
    serde_json::to_string(envelope).map_err(|e| DispatchError::Encoding {
        reason: e.to_string(),
    })
}
