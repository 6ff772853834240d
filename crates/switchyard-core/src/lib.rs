//! # switchyard-core
//!
//! Foundation types shared by every switchyard crate:
//!
//! - [`envelope`]: the `{destination, body}` wire message and its JSON codec
//! - [`errors`]: [`DispatchError`] and [`HandlerError`] with stable error codes
//! - [`ids`]: branded [`ConnectionId`] / [`ClientId`] newtypes
//! - [`constants`]: connection attribute keys and timestamp formatting
//! - [`logging`]: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;

pub use envelope::Envelope;
pub use errors::{DispatchError, HandlerError};
pub use ids::{ClientId, ConnectionId};
