//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"shutting_down"` once shutdown has begun.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live sessions, attached or not.
    pub sessions: usize,
    /// Sessions with an open streaming connection.
    pub attached_sessions: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    shutting_down: bool,
    sessions: usize,
    attached_sessions: usize,
) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        sessions,
        attached_sessions,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn status_reflects_shutdown() {
        assert_eq!(health_check(Instant::now(), false, 0, 0).status, "ok");
        assert_eq!(
            health_check(Instant::now(), true, 0, 0).status,
            "shutting_down"
        );
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        assert!(health_check(start, false, 0, 0).uptime_secs >= 59);
    }

    #[test]
    fn serializes_session_counts() {
        let json = serde_json::to_value(health_check(Instant::now(), false, 3, 1)).unwrap();
        assert_eq!(json["sessions"], 3);
        assert_eq!(json["attached_sessions"], 1);
        assert_eq!(json["status"], "ok");
    }
}
