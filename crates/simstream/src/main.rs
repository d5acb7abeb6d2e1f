//! # simstream
//!
//! Frame streaming server binary: loads settings, wires the dataset source
//! into the server and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use simstream_core::logging::LogOptions;
use simstream_server::config::{ServerConfig, source_from_settings};
use simstream_server::server::StreamServer;
use simstream_settings::SimstreamSettings;

/// How long open streams get to close after ctrl-c.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulation frame streaming server.
#[derive(Parser, Debug)]
#[command(name = "simstream", about = "Simulation frame streaming server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.simstream/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Keepalive TTL in seconds (overrides settings).
    #[arg(long)]
    keepalive_ttl_secs: Option<u64>,
}

impl Cli {
    fn load_settings(&self) -> Result<SimstreamSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(simstream_settings::settings_path);
        let mut settings = simstream_settings::load_settings_from_path(&path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;

        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ttl) = self.keepalive_ttl_secs {
            settings.stream.keepalive_ttl_secs = ttl;
        }
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    let _ = simstream_core::logging::init_subscriber(LogOptions {
        level: &settings.logging.level,
        span_timing: settings.logging.span_timing,
    });

    let metrics = simstream_server::metrics::install_recorder()
        .context("failed to install metrics recorder")?;
    let source = Arc::new(source_from_settings(&settings));
    let config = ServerConfig::from_settings(&settings);

    tracing::info!(
        datasets = ?settings.datasets.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        keepalive_ttl_secs = settings.stream.keepalive_ttl_secs,
        workers = config.loader_workers,
        "starting simstream"
    );

    let server = StreamServer::new(config, source, metrics);
    let (addr, handles) = server
        .listen()
        .await
        .context("failed to bind listener")?;
    tracing::info!(%addr, "ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    server.shutdown().drain(handles, Some(SHUTDOWN_TIMEOUT)).await;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["simstream"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.settings.is_none());
    }

    #[test]
    fn cli_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9000,"host":"0.0.0.0"}}"#).unwrap();

        let cli = Cli::parse_from([
            "simstream",
            "--settings",
            path.to_str().unwrap(),
            "--port",
            "0",
            "--host",
            "127.0.0.1",
            "--keepalive-ttl-secs",
            "30",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.stream.keepalive_ttl_secs, 30);
    }

    #[test]
    fn zero_ttl_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "simstream",
            "--settings",
            dir.path().join("none.json").to_str().unwrap(),
            "--keepalive-ttl-secs",
            "0",
        ]);
        assert!(cli.load_settings().is_err());
    }

    #[tokio::test]
    async fn server_boots_from_settings() {
        let mut settings = SimstreamSettings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 0;

        let server = StreamServer::new(
            ServerConfig::from_settings(&settings),
            Arc::new(source_from_settings(&settings)),
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle(),
        );
        let (addr, handles) = server.listen().await.unwrap();

        let resp = reqwest::get(format!("http://{addr}/sim/test")).await.unwrap();
        assert!(resp.status().is_success());

        server
            .shutdown()
            .drain(handles, Some(Duration::from_secs(5)))
            .await;
    }
}
