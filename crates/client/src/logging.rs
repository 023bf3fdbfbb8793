//! Logging for the client core.
//!
//! Provides the `log_*` macros used throughout the crate. They format their
//! arguments and hand the message to `tracing` under the `bunker_client`
//! target, so hosts can filter the core independently of their own output.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` fmt subscriber for hosts that don't bring their own.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (e.g. `"bunker_client=debug"`). Calling this more than once is harmless.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn log_info_impl(msg: &str) {
    tracing::info!(target: "bunker_client", "{}", msg);
}

pub fn log_error_impl(msg: &str) {
    tracing::error!(target: "bunker_client", "{}", msg);
}

pub fn log_warn_impl(msg: &str) {
    tracing::warn!(target: "bunker_client", "{}", msg);
}

pub fn log_debug_impl(msg: &str) {
    tracing::debug!(target: "bunker_client", "{}", msg);
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info_impl(&format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error_impl(&format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log_warn_impl(&format!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug_impl(&format!($($arg)*))
    };
}
