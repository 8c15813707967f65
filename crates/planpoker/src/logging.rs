//! Log output setup.
//!
//! The library only emits `tracing` events; installing a subscriber is
//! up to the binary. These helpers install a `fmt` subscriber filtered by
//! `RUST_LOG`, or by the given directives when `RUST_LOG` is unset.

use tracing_subscriber::EnvFilter;

use crate::PlanPokerError;

/// Filter used when `RUST_LOG` is unset and no directives are given.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter: `RUST_LOG` wins over `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Installs the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn try_init(default_directives: &str) -> Result<(), PlanPokerError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directives))
        .with_target(true)
        .try_init()
        .map_err(|e| PlanPokerError::Logging(e.to_string()))
}

/// Installs the global subscriber, keeping an existing one if present.
pub fn init(default_directives: &str) {
    if let Err(e) = try_init(default_directives) {
        tracing::debug!(error = %e, "log subscriber already installed");
    }
}
