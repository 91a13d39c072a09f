//! Structured logging setup.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// `info` level. Calling this twice is harmless; the second call is ignored.
pub fn init() {
    init_with_default(LevelFilter::INFO);
}

/// Like [`init`], with a different default level (e.g. `DEBUG` for `--verbose`).
pub fn init_with_default(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
