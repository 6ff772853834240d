//! WebSocket connection state, handshake, session registry, dispatch and
//! outbound delivery.

pub mod connection;
pub mod dispatcher;
pub mod handshake;
pub mod outbound;
pub mod registry;
pub mod session;

pub use connection::{ClientConnection, ConnectionState};
pub use dispatcher::{DispatchOutcome, Dispatcher, FailureReporter, TracingReporter};
pub use handshake::{Handshake, resolve_handshake};
pub use outbound::Outbound;
pub use registry::SessionRegistry;
