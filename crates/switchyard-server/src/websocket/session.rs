//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::dispatcher::Dispatcher;
use crate::config::HeartbeatConfig;

/// How long the writer gets to flush a Close frame after the reader exits.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Run a WebSocket session for a connected client.
///
/// 1. Opens the connection and registers its identity
/// 2. Forwards queued outbound frames and sends periodic Ping frames
/// 3. Dispatches inbound text (and UTF-8 binary) frames one at a time
/// 4. Ends on peer close, transport error, missed pongs, takeover, or shutdown
/// 5. Deregisters the connection
#[instrument(skip_all, fields(connection_id = %connection.id, client_id = %connection.client_id()))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection: Arc<ClientConnection>,
    mut send_rx: mpsc::Receiver<String>,
    dispatcher: Arc<Dispatcher>,
    heartbeat: HeartbeatConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    if !dispatcher.on_connect(&connection) {
        warn!("connection was not in connecting state, dropping");
        return;
    }
    info!("client connected");

    let close = connection.close_token();

    // Outbound forwarder with periodic Ping frames.
    let writer_conn = Arc::clone(&connection);
    let writer_close = close.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat.interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if !writer_conn.check_alive() && writer_conn.last_pong_elapsed() > heartbeat.timeout {
                        warn!(timeout = ?heartbeat.timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_close.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        // Wake the reader if the writer ended first.
        writer_conn.close();
    });

    loop {
        let next = tokio::select! {
            next = ws_rx.next() => next,
            () = close.cancelled() => {
                debug!("close requested");
                break;
            }
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                info!(error = %e, "websocket transport error");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        match msg {
            Message::Text(text) => {
                let _ = dispatcher.dispatch(&connection, text.as_str()).await;
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = dispatcher.dispatch(&connection, text).await;
                }
                Err(_) => debug!(len = data.len(), "non-UTF8 binary frame ignored"),
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let _ = dispatcher.on_disconnect(&connection);
    connection.close();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
}
