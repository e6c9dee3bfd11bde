#![forbid(unsafe_code)]

//! Subscriber bootstrap for binaries and tests.
//!
//! The library crates only emit `tracing` events. Applications that do not
//! install their own subscriber can call [`init`] once at startup. The filter
//! is read from `STARSCAPE_LOG` (same syntax as `RUST_LOG`) and falls back to
//! [`DEFAULT_FILTER`].

use tracing_subscriber::EnvFilter;

/// Filter used when `STARSCAPE_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("STARSCAPE_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}

/// Install a JSON fmt subscriber.
#[cfg(feature = "logging-json")]
pub fn init_json() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}
