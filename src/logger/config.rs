/// Logger configuration, scanned from command-line arguments
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    /// Tags with debug output enabled (by debug key)
    pub debug_tags: HashSet<String>,
    pub debug_all: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            debug_all: false,
        }
    }
}

impl LoggerConfig {
    /// Build from process arguments
    ///
    /// Recognized: `--debug-<tag>`, `--debug-all`, `--quiet`, `--log-level <level>`.
    /// Anything else is ignored so the same argument list can go to clap.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut expect_level = false;

        for arg in args {
            let arg = arg.as_ref();
            if expect_level {
                if let Some(level) = LogLevel::parse(arg) {
                    config.min_level = level;
                }
                expect_level = false;
                continue;
            }

            match arg {
                "--debug-all" => config.debug_all = true,
                "--quiet" => config.min_level = LogLevel::Warning,
                "--log-level" => expect_level = true,
                _ => {
                    if let Some(tag) = arg.strip_prefix("--debug-") {
                        if !tag.is_empty() {
                            config.debug_tags.insert(tag.to_lowercase());
                        }
                    }
                }
            }
        }

        // Debug flags raise the default threshold, never an explicit --quiet
        let debug_requested = config.debug_all || !config.debug_tags.is_empty();
        if debug_requested && config.min_level == LogLevel::Info {
            config.min_level = LogLevel::Debug;
        }

        config
    }

    pub fn is_debug_enabled_for(&self, tag: &LogTag) -> bool {
        self.debug_all || self.debug_tags.contains(&tag.to_debug_key())
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Read `std::env::args()` into the global logger configuration
pub fn init_from_args() {
    set_logger_config(LoggerConfig::from_args(std::env::args()));
}

/// Enable debug output for specific tags at runtime
pub fn set_debug_tags(tags: &[LogTag]) {
    let mut config = LOGGER_CONFIG.write();
    for tag in tags {
        config.debug_tags.insert(tag.to_debug_key());
    }
    if config.min_level == LogLevel::Info {
        config.min_level = LogLevel::Debug;
    }
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().is_debug_enabled_for(tag)
}
