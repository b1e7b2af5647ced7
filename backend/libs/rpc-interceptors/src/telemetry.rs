//! Structured logging setup for services built on these interceptors

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "rpc_interceptors=info,request_auth=info,info";

/// Install the JSON subscriber (`RUST_LOG` or `default_filter`)
///
/// Returns `false` when a global subscriber was already installed, e.g. by a
/// test harness.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .json()
        .try_init()
        .is_ok()
}
