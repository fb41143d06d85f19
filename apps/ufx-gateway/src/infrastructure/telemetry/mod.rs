//! Tracing subscriber initialization.
//!
//! Host processes embedding the gateway call [`init`] once at startup.
//! Filtering follows `RUST_LOG` (default `info`). Library code only ever
//! emits through the `tracing` macros; it never installs a subscriber
//! itself.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the fmt subscriber with `RUST_LOG` filtering.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
