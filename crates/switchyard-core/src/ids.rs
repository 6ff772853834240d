//! Branded ID newtypes.
//!
//! A [`ConnectionId`] names one physical WebSocket connection and is assigned
//! by the server when the socket is accepted. A [`ClientId`] names a logical
//! client and survives reconnects: it is whatever the client sent as
//! `clientUuid` during the handshake, or the connection ID when it sent
//! nothing. Keeping them as separate types stops a transient connection ID
//! from being used where a stable identity is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id!(
    /// Process-unique identity of one live connection, assigned by the server.
    ConnectionId
);

branded_id!(
    /// Stable identity of a logical client across reconnects.
    ClientId
);

impl ConnectionId {
    /// Generate a fresh connection ID (`conn_` + UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<&ConnectionId> for ClientId {
    /// Fallback identity for clients that did not send a `clientUuid`.
    fn from(id: &ConnectionId) -> Self {
        Self(id.0.clone())
    }
}
