//! Utility module
//!
//! Logging setup shared by binaries and integration harnesses.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "thread_bbr=info";

/// Installs a formatted `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `filter`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_LOG_FILTER)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
