//! Structured logging for the fetch layer
//!
//! Tag-based, leveled console logging:
//! - Standard log levels (Error/Warning/Info/Debug)
//! - Per-tag debug control via --debug-<tag> flags
//!
//! ## Usage
//!
//! ```rust
//! use fivetran_fetch::logger::{self, LogTag};
//!
//! logger::warning(LogTag::Fetch, "HTTP 429 from groups, backing off 60s");
//! logger::debug(LogTag::Cache, "cache hit for groups"); // Only with --debug-cache
//! ```
//!
//! Call `logger::init()` once at startup to pick up the flags from the
//! process arguments.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{
    get_logger_config, init_from_args, is_debug_enabled_for_tag, set_debug_tags,
    set_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger from command-line arguments
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (only when --debug-<tag> is set for this tag)
///
/// # Example
/// ```rust
/// use fivetran_fetch::logger::{self, LogTag};
///
/// // Only shown with --debug-transport
/// logger::debug(LogTag::Transport, "GET https://api.fivetran.com/v1/groups");
/// ```
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}
