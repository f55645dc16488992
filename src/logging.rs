//! Logging setup

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `filter` (`info`,
/// `dashguard=debug,tower_http=info`, ...). Later calls are no-ops.
pub fn init_logger(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
}
