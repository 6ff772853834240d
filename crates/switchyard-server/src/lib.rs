//! # switchyard-server
//!
//! Axum HTTP + `WebSocket` server that multiplexes named topics over one
//! connection per client.
//!
//! - `WebSocket` endpoint: handshake resolution, per-connection session loop,
//!   heartbeat
//! - Topic registry with typed handlers, decoded once per frame
//! - Session registry keyed by stable client identity, last connect wins
//! - Outbound API: send to a connection, to a client identity, or to everyone
//! - HTTP endpoints: health check, Prometheus metrics
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod topics;
pub mod websocket;

pub use config::ServerConfig;
pub use server::SwitchyardServer;
pub use topics::{TopicContext, TopicHandler, TopicRegistry};
pub use websocket::{DispatchOutcome, Dispatcher, Outbound};
