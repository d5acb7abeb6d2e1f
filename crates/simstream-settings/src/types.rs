//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial; missing fields keep their default value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Upper bound for every duration setting, in seconds (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

fn check_secs(key: &str, value: u64) -> Result<()> {
    if (1..=MAX_DURATION_SECS).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!(
            "{key} must be between 1 and {MAX_DURATION_SECS}, got {value}"
        )))
    }
}

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "stream": { "keepaliveTtlSecs": 60 },
///   "datasets": [{ "name": "water", "frameCount": 500, "elementCount": 3000 }]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimstreamSettings {
    /// HTTP/WebSocket listener.
    pub server: ServerSettings,
    /// Streaming session behaviour.
    pub stream: StreamSettings,
    /// Dataset preparation worker pool.
    pub loader: LoaderSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Datasets offered to clients.
    pub datasets: Vec<DatasetSettings>,
}

impl SimstreamSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_secs("stream.keepaliveTtlSecs", self.stream.keepalive_ttl_secs)?;
        check_secs("stream.sweepIntervalSecs", self.stream.sweep_interval_secs)?;
        if let Some(expiry) = self.stream.session_expiry_secs {
            check_secs("stream.sessionExpirySecs", expiry)?;
        }
        if self.loader.workers == 0 {
            return Err(SettingsError::InvalidValue(
                "loader.workers must be at least 1".into(),
            ));
        }
        let mut seen = HashSet::new();
        for d in &self.datasets {
            if d.name.is_empty() {
                return Err(SettingsError::InvalidValue("dataset name is empty".into()));
            }
            if d.frame_count == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "dataset {} has no frames",
                    d.name
                )));
            }
            if !seen.insert(d.name.as_str()) {
                return Err(SettingsError::InvalidValue(format!(
                    "dataset {} is listed twice",
                    d.name
                )));
            }
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Scheme prefix for the `ws_url` advertised in manifests.
    pub ws_protocol: String,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
            ws_protocol: "ws://".to_string(),
            max_message_size: 64 * 1024,
        }
    }
}

/// Streaming session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Keepalive TTL; pings go out every half TTL and an unanswered ping
    /// closes the connection half a TTL later.
    pub keepalive_ttl_secs: u64,
    /// How long a session may wait for its streaming connection before it is
    /// released. Defaults to one keepalive TTL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expiry_secs: Option<u64>,
    /// How often the unattached-session sweeper runs.
    pub sweep_interval_secs: u64,
}

impl StreamSettings {
    /// Effective unattached-session expiry.
    pub fn effective_session_expiry_secs(&self) -> u64 {
        self.session_expiry_secs.unwrap_or(self.keepalive_ttl_secs)
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            keepalive_ttl_secs: 1000,
            session_expiry_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

/// Dataset preparation pool settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderSettings {
    /// Maximum dataset preparations running at once.
    pub workers: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Log busy and idle time when each span closes.
    pub span_timing: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_timing: false,
        }
    }
}

/// One synthetic dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetSettings {
    /// Name clients request.
    pub name: String,
    /// Total frames.
    pub frame_count: u32,
    /// `f32` elements per frame.
    pub element_count: u32,
    /// Label reported for every element.
    pub label: String,
    /// Generator seed.
    pub seed: u64,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            name: "test".to_string(),
            frame_count: 10,
            element_count: 10,
            label: "O".to_string(),
            seed: 0x5eed,
        }
    }
}

impl Default for SimstreamSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            stream: StreamSettings::default(),
            loader: LoaderSettings::default(),
            logging: LoggingSettings::default(),
            datasets: vec![DatasetSettings::default()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let s: SimstreamSettings =
            serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.stream.keepalive_ttl_secs, 1000);
    }

    #[test]
    fn dataset_fields_are_camel_case() {
        let s: SimstreamSettings = serde_json::from_str(
            r#"{"datasets":[{"name":"water","frameCount":5,"elementCount":3}]}"#,
        )
        .unwrap();
        assert_eq!(s.datasets.len(), 1);
        assert_eq!(s.datasets[0].frame_count, 5);
        assert_eq!(s.datasets[0].element_count, 3);
        assert_eq!(s.datasets[0].label, "O");
    }

    #[test]
    fn session_expiry_defaults_to_ttl() {
        let mut stream = StreamSettings {
            keepalive_ttl_secs: 30,
            ..StreamSettings::default()
        };
        assert_eq!(stream.effective_session_expiry_secs(), 30);
        stream.session_expiry_secs = Some(5);
        assert_eq!(stream.effective_session_expiry_secs(), 5);
    }

    #[test]
    fn zero_ttl_is_invalid() {
        let mut s = SimstreamSettings::default();
        s.stream.keepalive_ttl_secs = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn oversized_durations_are_invalid() {
        let mut s = SimstreamSettings::default();
        s.stream.keepalive_ttl_secs = u64::MAX;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));

        let mut s = SimstreamSettings::default();
        s.stream.session_expiry_secs = Some(MAX_DURATION_SECS + 1);
        assert!(s.validate().is_err());

        let mut s = SimstreamSettings::default();
        s.stream.sweep_interval_secs = MAX_DURATION_SECS + 1;
        assert!(s.validate().is_err());

        let mut s = SimstreamSettings::default();
        s.stream.keepalive_ttl_secs = MAX_DURATION_SECS;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_workers_is_invalid() {
        let mut s = SimstreamSettings::default();
        s.loader.workers = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn empty_dataset_is_invalid() {
        let mut s = SimstreamSettings::default();
        s.datasets[0].frame_count = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("no frames"));
    }

    #[test]
    fn duplicate_dataset_is_invalid() {
        let mut s = SimstreamSettings::default();
        s.datasets.push(DatasetSettings::default());
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }
}
