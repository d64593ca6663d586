//! tracing subscriber setup for embedding hosts

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `filter` (e.g. `"depcore=debug"`).
///
/// `RUST_LOG` takes precedence when set. Calling this more than once, or
/// after the host installed its own subscriber, is a no-op.
pub fn init(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
