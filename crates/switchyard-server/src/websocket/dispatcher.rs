//! Dispatcher: connection lifecycle and inbound frame routing.
//!
//! Per frame: decode the envelope, look up the topic, decode the body into the
//! handler's payload type, run the handler, stamp `updatedAt`. Every failure
//! is scoped to the frame. Nothing here closes the connection except an
//! identity takeover when superseded connections are configured to close.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use switchyard_core::constants::{ATTR_DISCONNECTED_AT, ATTR_UPDATED_AT, attribute_now};
use switchyard_core::errors::UNKNOWN_TOPIC;
use switchyard_core::{DispatchError, envelope};
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::outbound::Outbound;
use super::registry::SessionRegistry;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_DISPATCH_ERRORS_TOTAL, WS_FRAMES_TOTAL,
    WS_HANDLER_DURATION_SECONDS, WS_SESSIONS_SUPERSEDED_TOTAL,
};
use crate::topics::context::TopicContext;
use crate::topics::registry::TopicRegistry;

/// Handlers running at least this long are logged as slow.
const SLOW_HANDLER_THRESHOLD: Duration = Duration::from_secs(5);

/// Receives per-frame failures. Must not block.
pub trait FailureReporter: Send + Sync {
    /// Report a dropped frame or failed handler.
    fn report(&self, connection: &ClientConnection, error: &DispatchError);
}

/// Default reporter: a `warn` event plus an error counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, connection: &ClientConnection, error: &DispatchError) {
        counter!(WS_DISPATCH_ERRORS_TOTAL, "error_type" => error.code()).increment(1);
        warn!(
            connection_id = %connection.id,
            client_id = %connection.client_id(),
            error_code = error.code(),
            error = %error,
            "dispatch failed"
        );
    }
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran to completion.
    Delivered {
        /// Topic of the frame.
        topic: String,
    },
    /// No handler for the topic. Not an error.
    Ignored {
        /// Topic of the frame.
        topic: String,
    },
    /// Frame dropped; the error was reported.
    Dropped(DispatchError),
}

/// Routes inbound frames and tracks connection lifecycle.
pub struct Dispatcher {
    topics: Arc<TopicRegistry>,
    sessions: Arc<SessionRegistry>,
    outbound: Outbound,
    reporter: Arc<dyn FailureReporter>,
    close_superseded: bool,
    active: AtomicUsize,
}

impl Dispatcher {
    /// Create a dispatcher with the tracing reporter, closing superseded
    /// connections.
    pub fn new(topics: Arc<TopicRegistry>, sessions: Arc<SessionRegistry>) -> Self {
        let outbound = Outbound::new(Arc::clone(&sessions));
        Self {
            topics,
            sessions,
            outbound,
            reporter: Arc::new(TracingReporter),
            close_superseded: true,
            active: AtomicUsize::new(0),
        }
    }

    /// Replace the failure reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Whether a reconnect under a held identity closes the older connection.
    #[must_use]
    pub fn with_close_superseded(mut self, close: bool) -> Self {
        self.close_superseded = close;
        self
    }

    /// Topic registry.
    pub fn topics(&self) -> &Arc<TopicRegistry> {
        &self.topics
    }

    /// Session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Outbound API handle for components outside the dispatch loop.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Connections currently open.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Open a connection and register it under its effective identity.
    ///
    /// Returns `false` if the connection was already opened or closed.
    pub fn on_connect(&self, connection: &Arc<ClientConnection>) -> bool {
        if !connection.mark_open() {
            return false;
        }
        let _ = self.active.fetch_add(1, Ordering::Relaxed);
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

        if let Some(previous) = self.sessions.on_connect(Arc::clone(connection)) {
            counter!(WS_SESSIONS_SUPERSEDED_TOTAL).increment(1);
            if self.close_superseded {
                info!(
                    client_id = %connection.client_id(),
                    superseded = %previous.id,
                    "closing superseded connection"
                );
                previous.close();
            } else {
                debug!(
                    client_id = %connection.client_id(),
                    superseded = %previous.id,
                    "superseded connection left open"
                );
            }
        }
        true
    }

    /// Close a connection and drop its registry entry if it still owns one.
    ///
    /// Returns `false` if the connection was already closed.
    pub fn on_disconnect(&self, connection: &ClientConnection) -> bool {
        let was_open = connection.is_open();
        if !connection.mark_closed() {
            return false;
        }
        connection.set_attribute(ATTR_DISCONNECTED_AT, attribute_now());
        let deregistered = self.sessions.on_disconnect(connection);
        if was_open {
            let _ = self.active.fetch_sub(1, Ordering::Relaxed);
            counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
            gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
            histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
        }
        debug!(
            connection_id = %connection.id,
            deregistered,
            dropped = connection.drop_count(),
            "connection closed"
        );
        true
    }

    /// Process one inbound text frame.
    pub async fn dispatch(&self, connection: &Arc<ClientConnection>, raw: &str) -> DispatchOutcome {
        let outcome = self.route(connection, raw).await;
        connection.set_attribute(ATTR_UPDATED_AT, attribute_now());
        outcome
    }

    async fn route(&self, connection: &Arc<ClientConnection>, raw: &str) -> DispatchOutcome {
        let envelope = match envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => return self.drop_frame(connection, e),
        };
        let topic = envelope.destination.clone();

        let Some(descriptor) = self.topics.lookup(&topic) else {
            counter!(WS_DISPATCH_ERRORS_TOTAL, "error_type" => UNKNOWN_TOPIC).increment(1);
            debug!(connection_id = %connection.id, topic, "no handler for topic, frame ignored");
            return DispatchOutcome::Ignored { topic };
        };

        counter!(WS_FRAMES_TOTAL, "topic" => topic.clone()).increment(1);
        let ctx = TopicContext::new(topic.clone(), Arc::clone(connection), self.outbound.clone());

        let start = Instant::now();
        let result = descriptor.invoke(&ctx, &envelope).await;
        let elapsed = start.elapsed();
        histogram!(WS_HANDLER_DURATION_SECONDS, "topic" => topic.clone())
            .record(elapsed.as_secs_f64());
        if elapsed >= SLOW_HANDLER_THRESHOLD {
            warn!(
                topic,
                duration_secs = elapsed.as_secs_f64(),
                "slow topic handler"
            );
        }

        match result {
            Ok(()) => DispatchOutcome::Delivered { topic },
            Err(e) => self.drop_frame(connection, e),
        }
    }

    fn drop_frame(&self, connection: &ClientConnection, error: DispatchError) -> DispatchOutcome {
        self.reporter.report(connection, &error);
        DispatchOutcome::Dropped(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::registry::TopicHandler;
    use crate::websocket::connection::test_helpers::{make_connection, open_connection};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::Value;
    use switchyard_core::HandlerError;
    use switchyard_core::constants::ATTR_CLIENT_UUID;
    use switchyard_core::logging::capture_logs;
    use tracing::Level;

    #[derive(Default)]
    struct CollectingReporter {
        errors: Mutex<Vec<DispatchError>>,
    }

    impl FailureReporter for CollectingReporter {
        fn report(&self, _connection: &ClientConnection, error: &DispatchError) {
            self.errors.lock().push(error.clone());
        }
    }

    /// Echoes `String` payloads back via `sendToSession`.
    struct StringEcho {
        calls: Arc<Mutex<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl TopicHandler for StringEcho {
        type Payload = String;

        async fn handle(&self, ctx: &TopicContext, payload: Option<String>) -> Result<(), HandlerError> {
            self.calls.lock().push(payload.clone());
            ctx.reply("echo", &payload)?;
            Ok(())
        }
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Order {
        id: u64,
    }

    struct OrderHandler;

    #[async_trait]
    impl TopicHandler for OrderHandler {
        type Payload = Order;

        async fn handle(&self, _ctx: &TopicContext, _payload: Option<Order>) -> Result<(), HandlerError> {
            Err(HandlerError::failed("out of stock"))
        }
    }

    /// Tries to rewrite the caller's identity attribute mid-session.
    struct Rename;

    #[async_trait]
    impl TopicHandler for Rename {
        type Payload = String;

        async fn handle(&self, ctx: &TopicContext, payload: Option<String>) -> Result<(), HandlerError> {
            if let Some(name) = payload {
                ctx.connection.set_attribute(ATTR_CLIENT_UUID, name);
            }
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        reporter: Arc<CollectingReporter>,
        calls: Arc<Mutex<Vec<Option<String>>>>,
    }

    fn fixture() -> Fixture {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let topics = Arc::new(TopicRegistry::new());
        let _ = topics.register("echo", StringEcho { calls: Arc::clone(&calls) });
        let _ = topics.register("order.place", OrderHandler);
        let _ = topics.register("rename", Rename);
        let reporter = Arc::new(CollectingReporter::default());
        let dispatcher = Dispatcher::new(topics, Arc::new(SessionRegistry::new()))
            .with_reporter(Arc::clone(&reporter) as Arc<dyn FailureReporter>);
        Fixture {
            dispatcher,
            reporter,
            calls,
        }
    }

    #[tokio::test]
    async fn echo_scenario() {
        let fx = fixture();
        let (conn, mut rx) = make_connection("conn_1", None, 8);
        assert!(fx.dispatcher.on_connect(&conn));

        let outcome = fx
            .dispatcher
            .dispatch(&conn, r#"{"destination":"echo","body":"hi"}"#)
            .await;

        assert_eq!(outcome, DispatchOutcome::Delivered { topic: "echo".into() });
        assert_eq!(fx.calls.lock().as_slice(), &[Some("hi".to_owned())]);
        assert_eq!(rx.recv().await.unwrap(), r#"{"destination":"echo","body":"hi"}"#);
        assert!(fx.reporter.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn unknown_topic_is_ignored_without_report() {
        let fx = fixture();
        let (conn, _rx) = open_connection("conn_1", None);
        let outcome = fx
            .dispatcher
            .dispatch(&conn, r#"{"destination":"nobody.listens","body":"x"}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Ignored { topic: "nobody.listens".into() });
        assert!(fx.calls.lock().is_empty());
        assert!(fx.reporter.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_and_connection_stays_open() {
        let fx = fixture();
        let (conn, _rx) = open_connection("conn_1", None);
        let outcome = fx.dispatcher.dispatch(&conn, r#"{"body":"no destination"}"#).await;
        assert_matches!(outcome, DispatchOutcome::Dropped(DispatchError::MalformedEnvelope { .. }));
        assert!(conn.is_open());
        assert!(!conn.is_close_requested());
        assert_eq!(fx.reporter.errors.lock().len(), 1);
        assert!(fx.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn decode_failure_is_reported() {
        let fx = fixture();
        let (conn, _rx) = open_connection("conn_1", None);
        let outcome = fx
            .dispatcher
            .dispatch(&conn, r#"{"destination":"order.place","body":"{\"id\":\"abc\"}"}"#)
            .await;
        assert_matches!(outcome, DispatchOutcome::Dropped(DispatchError::PayloadDecode { .. }));
        assert_matches!(
            fx.reporter.errors.lock().as_slice(),
            [DispatchError::PayloadDecode { topic, .. }] if topic == "order.place"
        );
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn handler_failure_is_reported() {
        let fx = fixture();
        let (conn, _rx) = open_connection("conn_1", None);
        let outcome = fx
            .dispatcher
            .dispatch(&conn, r#"{"destination":"order.place","body":"{\"id\":1}"}"#)
            .await;
        assert_matches!(
            outcome,
            DispatchOutcome::Dropped(DispatchError::HandlerFailure { ref message, .. }) if message == "out of stock"
        );
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn updated_at_stamped_even_for_dropped_frames() {
        let fx = fixture();
        let (conn, _rx) = open_connection("conn_1", None);
        assert!(conn.attribute(ATTR_UPDATED_AT).is_none());
        let _ = fx.dispatcher.dispatch(&conn, "not json").await;
        assert!(conn.attribute(ATTR_UPDATED_AT).is_some());
    }

    #[tokio::test]
    async fn frames_after_failure_still_dispatch() {
        let fx = fixture();
        let (conn, mut rx) = open_connection("conn_1", None);
        let _ = fx.dispatcher.dispatch(&conn, "garbage").await;
        let _ = fx.dispatcher.dispatch(&conn, r#"{"destination":"order.place"}"#).await;
        let outcome = fx
            .dispatcher
            .dispatch(&conn, r#"{"destination":"echo","body":"still here"}"#)
            .await;
        assert_matches!(outcome, DispatchOutcome::Delivered { .. });
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"destination":"echo","body":"still here"}"#
        );
    }

    #[test]
    fn connect_registers_identity() {
        let fx = fixture();
        let (conn, _rx) = make_connection("conn_1", Some("kiosk-1"), 4);
        assert!(fx.dispatcher.on_connect(&conn));
        assert!(!fx.dispatcher.on_connect(&conn));
        assert!(fx.dispatcher.sessions().resolve("kiosk-1").is_some());
        assert_eq!(fx.dispatcher.active_connections(), 1);
    }

    #[tokio::test]
    async fn send_to_client_id_after_connect_arrives_first() {
        let fx = fixture();
        let (conn, mut rx) = make_connection("conn_1", Some("kiosk-2"), 4);
        let _ = fx.dispatcher.on_connect(&conn);
        fx.dispatcher
            .outbound()
            .send_to_client_id("kiosk-2", "welcome", &Value::Bool(true))
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), r#"{"destination":"welcome","body":true}"#);
    }

    #[test]
    fn disconnect_is_idempotent_and_removes_identity() {
        let fx = fixture();
        let (conn, _rx) = make_connection("conn_1", Some("kiosk-3"), 4);
        let _ = fx.dispatcher.on_connect(&conn);
        assert!(fx.dispatcher.on_disconnect(&conn));
        assert!(!fx.dispatcher.on_disconnect(&conn));
        assert!(fx.dispatcher.sessions().resolve("kiosk-3").is_none());
        assert!(conn.attribute(ATTR_DISCONNECTED_AT).is_some());
        assert_eq!(fx.dispatcher.active_connections(), 0);
        assert_matches!(
            fx.dispatcher.outbound().send_to_client_id("kiosk-3", "x", &1),
            Err(DispatchError::UnknownClient { .. })
        );
    }

    #[tokio::test]
    async fn handler_cannot_change_identity_used_for_deregistration() {
        let fx = fixture();
        let (conn, _rx) = make_connection("conn_1", Some("alice"), 4);
        let _ = fx.dispatcher.on_connect(&conn);

        let outcome = fx
            .dispatcher
            .dispatch(&conn, r#"{"destination":"rename","body":"mallory"}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Delivered { topic: "rename".into() });
        assert_eq!(conn.client_id().as_str(), "alice");

        assert!(fx.dispatcher.on_disconnect(&conn));
        assert!(fx.dispatcher.sessions().resolve("alice").is_none());
        assert!(fx.dispatcher.sessions().resolve("mallory").is_none());
        assert!(fx.dispatcher.sessions().is_empty());
        assert_matches!(
            fx.dispatcher.outbound().send_to_client_id("alice", "x", &1),
            Err(DispatchError::UnknownClient { .. })
        );
    }

    #[test]
    fn superseded_connection_is_closed() {
        let fx = fixture();
        let (first, _rx1) = make_connection("conn_1", Some("phone"), 4);
        let (second, _rx2) = make_connection("conn_2", Some("phone"), 4);
        let _ = fx.dispatcher.on_connect(&first);
        let _ = fx.dispatcher.on_connect(&second);
        assert!(first.is_close_requested());
        assert!(!second.is_close_requested());

        // The old connection's late disconnect leaves the new entry alone.
        assert!(fx.dispatcher.on_disconnect(&first));
        let current = fx.dispatcher.sessions().resolve("phone").unwrap();
        assert!(Arc::ptr_eq(&current, &second));
    }

    #[tokio::test]
    async fn superseded_connection_kept_open_when_configured() {
        let topics = Arc::new(TopicRegistry::new());
        let dispatcher =
            Dispatcher::new(topics, Arc::new(SessionRegistry::new())).with_close_superseded(false);
        let (first, mut rx1) = make_connection("conn_1", Some("phone"), 4);
        let (second, mut rx2) = make_connection("conn_2", Some("phone"), 4);
        let _ = dispatcher.on_connect(&first);
        let _ = dispatcher.on_connect(&second);
        assert!(!first.is_close_requested());

        dispatcher.outbound().send_to_client_id("phone", "ping", &1).unwrap();
        assert_eq!(rx2.recv().await.unwrap(), r#"{"destination":"ping","body":1}"#);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn tracing_reporter_logs_error_code() {
        let (logs, _guard) = capture_logs();
        let topics = Arc::new(TopicRegistry::new());
        let dispatcher = Dispatcher::new(topics, Arc::new(SessionRegistry::new()));
        let (conn, _rx) = open_connection("conn_1", None);
        let _ = dispatcher.dispatch(&conn, "[]").await;
        assert!(logs.has_event(Level::WARN, "dispatch failed"));
        assert!(logs.has_field("error_code", "MALFORMED_ENVELOPE"));
    }

    #[tokio::test]
    async fn unknown_topic_logged_at_debug_only() {
        let (logs, _guard) = capture_logs();
        let topics = Arc::new(TopicRegistry::new());
        let dispatcher = Dispatcher::new(topics, Arc::new(SessionRegistry::new()));
        let (conn, _rx) = open_connection("conn_1", None);
        let _ = dispatcher.dispatch(&conn, r#"{"destination":"nope"}"#).await;
        assert_eq!(logs.count_at_level(Level::WARN), 0);
        assert!(logs.has_event(Level::DEBUG, "no handler for topic"));
    }
}
