//! Logging setup
//!
//! Logs go to stderr so rendered channel contents on stdout stay clean.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "arenaview=debug"
    } else {
        "warn"
    }
}

/// Initialize logging to stderr
///
/// `RUST_LOG` wins when set; otherwise warnings only, or debug output for
/// this crate with `verbose`. Calling this twice is harmless.
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter)
        .try_init();
}
