//! Telemetry initialization.
//!
//! Controlled by two environment variables:
//! - `GRAFT_LOG`: an `EnvFilter` directive (default `warn`)
//! - `GRAFT_LOG_FORMAT`: `json` for JSON events on stderr, anything else for
//!   the human-readable formatter
//!
//! The engine itself only emits `tracing` events and spans. Without a
//! subscriber they are discarded.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive variable.
pub const LOG_ENV: &str = "GRAFT_LOG";

/// Output format variable.
pub const FORMAT_ENV: &str = "GRAFT_LOG_FORMAT";

/// Install the global subscriber.
///
/// Calling it again, or after another subscriber was installed, is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var(FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "subscriber already installed");
    }
}
