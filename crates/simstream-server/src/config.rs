//! Server configuration.

use std::time::Duration;

use simstream_core::{SyntheticDataset, SyntheticSource};
use simstream_settings::SimstreamSettings;

/// Runtime configuration for the stream server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Scheme prefix for advertised streaming URLs.
    pub ws_protocol: String,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Keepalive TTL; see [`crate::websocket::keepalive`].
    pub keepalive_ttl: Duration,
    /// Release sessions whose streaming connection has not arrived by then.
    pub session_expiry: Duration,
    /// Period of the unattached-session sweeper.
    pub sweep_interval: Duration,
    /// Concurrent dataset preparations.
    pub loader_workers: usize,
}

impl ServerConfig {
    /// Derive the runtime config from loaded settings.
    pub fn from_settings(settings: &SimstreamSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            ws_protocol: settings.server.ws_protocol.clone(),
            max_message_size: settings.server.max_message_size,
            keepalive_ttl: Duration::from_secs(settings.stream.keepalive_ttl_secs),
            session_expiry: Duration::from_secs(settings.stream.effective_session_expiry_secs()),
            sweep_interval: Duration::from_secs(settings.stream.sweep_interval_secs),
            loader_workers: settings.loader.workers,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_protocol: "ws://".into(),
            max_message_size: 64 * 1024,
            keepalive_ttl: Duration::from_secs(1000),
            session_expiry: Duration::from_secs(1000),
            sweep_interval: Duration::from_secs(60),
            loader_workers: 4,
        }
    }
}

/// Build the synthetic dataset source described by settings.
pub fn source_from_settings(settings: &SimstreamSettings) -> SyntheticSource {
    SyntheticSource::new(settings.datasets.iter().map(|d| SyntheticDataset {
        name: d.name.clone(),
        frame_count: d.frame_count,
        element_count: d.element_count,
        label: d.label.clone(),
        seed: d.seed,
    }))
}
