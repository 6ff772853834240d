//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Inbound frames routed to a handler (counter, labels: topic).
pub const WS_FRAMES_TOTAL: &str = "ws_frames_total";
/// Dropped inbound frames and failed sends (counter, labels: error_type).
pub const WS_DISPATCH_ERRORS_TOTAL: &str = "ws_dispatch_errors_total";
/// Topic handler run time (histogram, labels: topic).
pub const WS_HANDLER_DURATION_SECONDS: &str = "ws_handler_duration_seconds";
/// Outbound frames refused by a closed or full connection (counter).
pub const WS_SEND_FAILURES_TOTAL: &str = "ws_send_failures_total";
/// Registry entries replaced by a reconnect under the same identity (counter).
pub const WS_SESSIONS_SUPERSEDED_TOTAL: &str = "ws_sessions_superseded_total";
/// Lifetime of closed connections (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if another recorder
/// is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

fn describe_metrics() {
    ::metrics::describe_counter!(WS_CONNECTIONS_TOTAL, "WebSocket connections opened");
    ::metrics::describe_counter!(WS_DISCONNECTIONS_TOTAL, "WebSocket connections closed");
    ::metrics::describe_gauge!(WS_CONNECTIONS_ACTIVE, "Open WebSocket connections");
    ::metrics::describe_counter!(WS_FRAMES_TOTAL, "Inbound frames routed to a topic handler");
    ::metrics::describe_counter!(WS_DISPATCH_ERRORS_TOTAL, "Dropped frames and failed sends by error code");
    ::metrics::describe_histogram!(
        WS_HANDLER_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Topic handler run time"
    );
    ::metrics::describe_counter!(WS_SEND_FAILURES_TOTAL, "Outbound frames refused by a connection");
    ::metrics::describe_counter!(WS_SESSIONS_SUPERSEDED_TOTAL, "Identities taken over by a newer connection");
    ::metrics::describe_histogram!(
        WS_CONNECTION_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Lifetime of closed connections"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        // No global install, so parallel tests don't conflict.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            ::metrics::counter!(WS_CONNECTIONS_TOTAL).increment(2);
        });
        let output = render(&handle);
        assert!(output.contains("ws_connections_total 2"), "{output}");
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_FRAMES_TOTAL,
            WS_DISPATCH_ERRORS_TOTAL,
            WS_HANDLER_DURATION_SECONDS,
            WS_SEND_FAILURES_TOTAL,
            WS_SESSIONS_SUPERSEDED_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
            assert!(name.starts_with("ws_"));
        }
    }
}
