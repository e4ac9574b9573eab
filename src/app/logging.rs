use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the default tracing subscriber, filtered by `RUST_LOG`.
///
/// Intended for embedding applications that have no subscriber of their own;
/// call it once at startup. Calling it when a global subscriber is already
/// set is a no-op.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
