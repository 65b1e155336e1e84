/// Log tags identify the subsystem a line comes from
///
/// Each tag maps to a `--debug-<key>` flag that enables its debug output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    Fetch,
    Cache,
    Transport,
    Config,
    System,
    Other(String),
}

impl LogTag {
    /// Key used in `--debug-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::Fetch => "fetch".to_string(),
            LogTag::Cache => "cache".to_string(),
            LogTag::Transport => "transport".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::System => "system".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Uncolored label for the console prefix
    pub fn to_plain_string(&self) -> String {
        self.to_debug_key().to_uppercase()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
