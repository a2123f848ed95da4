use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a process-wide `tracing` subscriber. Idempotent: safe to call
/// from every test binary's setup without panicking on a second call.
/// Honors `RUST_LOG`; defaults to `info` when unset.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}
