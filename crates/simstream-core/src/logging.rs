//! Process-wide `tracing` subscriber.
//!
//! Output goes to stderr in compact form. The filter comes from `RUST_LOG`
//! when it is set and non-blank, otherwise from the configured level.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Directive used when neither `RUST_LOG` nor the settings give a usable one.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Logging knobs the binary passes in from settings.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions<'a> {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: &'a str,
    /// Log an event when each span closes, with its busy and idle time.
    /// Each streaming connection runs inside a `stream` span, so this
    /// yields one timing line per connection.
    pub span_timing: bool,
}

/// Choose the filter directive from `RUST_LOG` and the configured level.
pub fn filter_directive(env: Option<&str>, configured: &str) -> String {
    [env, Some(configured)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVE)
        .to_string()
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// stays in place.
pub fn init_subscriber(opts: LogOptions<'_>) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&filter_directive(env.as_deref(), opts.level));
    let span_events = if opts.span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins_when_set() {
        assert_eq!(filter_directive(Some("simstream=trace"), "warn"), "simstream=trace");
    }

    #[test]
    fn blank_values_fall_through() {
        assert_eq!(filter_directive(Some("  "), "debug"), "debug");
        assert_eq!(filter_directive(None, ""), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn bad_directive_falls_back_to_default() {
        let filter = build_filter("simstream=notalevel");
        assert_eq!(filter.to_string().to_lowercase(), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn second_install_reports_existing_subscriber() {
        let opts = LogOptions {
            level: "warn",
            span_timing: true,
        };
        let _ = init_subscriber(opts);
        assert!(!init_subscriber(LogOptions {
            level: "debug",
            span_timing: false,
        }));
    }
}
