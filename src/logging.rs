//! Tracing subscriber set-up for the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_FILTER: &str = "cwhscore=info,warn";

/// Install the global subscriber: compact human-readable lines on stderr,
/// filtered by `RUST_LOG`. Stdout stays free for tables and JSON.
///
/// `verbose` raises this crate's level to debug when `RUST_LOG` is unset.
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("cwhscore=debug,warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}
