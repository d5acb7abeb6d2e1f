//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before any metric is recorded. Tests should build a
/// detached handle with `PrometheusBuilder::new().build_recorder().handle()`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Sessions created by manifest requests (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "simstream_sessions_created_total";
/// Sessions released (counter, labels: reason).
pub const SESSIONS_RELEASED_TOTAL: &str = "simstream_sessions_released_total";
/// Manifest requests for unknown datasets (counter).
pub const DATASETS_NOT_FOUND_TOTAL: &str = "simstream_datasets_not_found_total";
/// Streaming connections currently open (gauge).
pub const STREAMS_ACTIVE: &str = "simstream_streams_active";
/// Streaming connections rejected for an unknown session (counter).
pub const STREAMS_REJECTED_TOTAL: &str = "simstream_streams_rejected_total";
/// Frame replies sent (counter, labels: outcome).
pub const FRAMES_SERVED_TOTAL: &str = "simstream_frames_served_total";
/// Inbound messages dropped without a reply (counter, labels: kind).
pub const MESSAGES_DROPPED_TOTAL: &str = "simstream_messages_dropped_total";
/// Connections closed by the keepalive (counter).
pub const KEEPALIVE_TIMEOUTS_TOTAL: &str = "simstream_keepalive_timeouts_total";
/// Dataset preparation time (histogram).
pub const DATASET_PREPARE_SECONDS: &str = "simstream_dataset_prepare_seconds";
