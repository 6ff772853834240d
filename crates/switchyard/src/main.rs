//! # switchyard
//!
//! Switchyard server binary: loads settings, sets up logging and metrics,
//! registers the built-in topics, and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use switchyard_core::constants::{NAME, VERSION};
use switchyard_core::logging::init_subscriber;
use switchyard_server::config::ServerConfig;
use switchyard_server::server::SwitchyardServer;
use switchyard_server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT;
use switchyard_server::topics::TopicRegistry;
use switchyard_server::topics::handlers::register_all;
use switchyard_settings::{SwitchyardSettings, load_settings, load_settings_from_path, settings_path};
use tracing::info;

/// Switchyard WebSocket dispatcher.
#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about = "Switchyard WebSocket dispatcher")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long, short)]
    port: Option<u16>,

    /// Settings file (default `~/.switchyard/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `switchyard_server=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(settings_path)
    }

    /// Apply CLI flags over loaded settings.
    fn apply(&self, mut settings: SwitchyardSettings) -> SwitchyardSettings {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings_path();
    let settings = match cli.settings {
        Some(ref explicit) => load_settings_from_path(explicit),
        None => load_settings(),
    }
    .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    let settings = cli.apply(settings);

    init_subscriber(&settings.logging.level, settings.logging.format());
    info!(name = NAME, version = VERSION, "starting");

    let metrics_handle = switchyard_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let topics = TopicRegistry::new();
    register_all(&topics);

    let config = ServerConfig::from(settings.server);
    let server = SwitchyardServer::new(config, topics, metrics_handle);
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server address")?;

    info!(
        %addr,
        endpoint = %server.config().endpoint_path,
        settings = %path.display(),
        "switchyard ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    let drained = server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(DEFAULT_SHUTDOWN_TIMEOUT))
        .await;
    info!(drained, "switchyard stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_keep_settings() {
        let cli = Cli::parse_from(["switchyard"]);
        let settings = cli.apply(SwitchyardSettings::default());
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "switchyard",
            "--host",
            "127.0.0.1",
            "-p",
            "9001",
            "--log-level",
            "debug",
        ]);
        let settings = cli.apply(SwitchyardSettings::default());
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn explicit_settings_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.json");
        std::fs::write(&file, r#"{"server":{"port":7000}}"#).unwrap();

        let cli = Cli::parse_from(["switchyard", "--settings", file.to_str().unwrap()]);
        assert_eq!(cli.settings_path(), file);
        let settings = switchyard_settings::load_with_env(&cli.settings_path(), |_| None).unwrap();
        assert_eq!(settings.server.port, 7000);
    }

    #[test]
    fn default_settings_path() {
        let cli = Cli::parse_from(["switchyard"]);
        assert!(cli.settings_path().ends_with(".switchyard/settings.json"));
    }
}
