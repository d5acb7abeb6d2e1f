//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SimstreamSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{MAX_DURATION_SECS, SimstreamSettings};

/// Resolve the default settings file (`~/.simstream/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".simstream").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SimstreamSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults; invalid JSON or invalid values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<SimstreamSettings> {
    let defaults = serde_json::to_value(SimstreamSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SimstreamSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SIMSTREAM_*` environment overrides.
pub fn apply_env_overrides(settings: &mut SimstreamSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are logged and
/// ignored, leaving the file/default value in place.
pub fn apply_overrides_from(
    settings: &mut SimstreamSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("SIMSTREAM_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("SIMSTREAM_PORT") {
        if let Some(port) = checked("SIMSTREAM_PORT", &v, parse_u16_range(&v, 0, 65535)) {
            settings.server.port = port;
        }
    }
    if let Some(v) = read("SIMSTREAM_WS_PROTOCOL") {
        settings.server.ws_protocol = v;
    }
    if let Some(v) = read("SIMSTREAM_KEEPALIVE_TTL_SECS") {
        if let Some(ttl) = checked(
            "SIMSTREAM_KEEPALIVE_TTL_SECS",
            &v,
            parse_u64_range(&v, 1, MAX_DURATION_SECS),
        ) {
            settings.stream.keepalive_ttl_secs = ttl;
        }
    }
    if let Some(v) = read("SIMSTREAM_SESSION_EXPIRY_SECS") {
        if let Some(secs) = checked(
            "SIMSTREAM_SESSION_EXPIRY_SECS",
            &v,
            parse_u64_range(&v, 1, MAX_DURATION_SECS),
        ) {
            settings.stream.session_expiry_secs = Some(secs);
        }
    }
    if let Some(v) = read("SIMSTREAM_LOADER_WORKERS") {
        if let Some(n) = checked(
            "SIMSTREAM_LOADER_WORKERS",
            &v,
            parse_usize_range(&v, 1, 256),
        ) {
            settings.loader.workers = n;
        }
    }
    if let Some(v) = read("SIMSTREAM_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("SIMSTREAM_LOG_SPAN_TIMING") {
        if let Some(on) = checked("SIMSTREAM_LOG_SPAN_TIMING", &v, parse_bool(&v)) {
            settings.logging.span_timing = on;
        }
    }
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse an on/off flag (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
