/// Configuration schemas - every section declared once with its defaults
///
/// Values are fixed for the lifetime of a coordinator; nothing here is
/// re-read at runtime.
use crate::config_struct;
use std::time::Duration;

/// Default API root; relative request paths are joined onto it
pub const DEFAULT_BASE_URL: &str = "https://api.fivetran.com/v1/";

/// The remote service may block requests without a descriptive agent header
pub const DEFAULT_USER_AGENT: &str = "Fivetran_Client_id_21";

pub const DEFAULT_TIMEOUT_SECS: u64 = 40;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

/// Longest backoff after a 429, whether configured or sent by the server
pub const MAX_RETRY_DELAY_SECS: u64 = 24 * 60 * 60;
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

// ============================================================================
// TRANSPORT
// ============================================================================

config_struct! {
    /// Connection settings for the remote REST API
    pub struct ApiConfig {
        base_url: String = DEFAULT_BASE_URL.to_string(),
        api_key: String = String::new(),
        #[serde(skip_serializing)]
        api_secret: String = String::new(),
        user_agent: String = DEFAULT_USER_AGENT.to_string(),
        timeout_secs: u64 = DEFAULT_TIMEOUT_SECS,
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// FETCH COORDINATION
// ============================================================================

config_struct! {
    /// Admission, caching and 429 handling
    pub struct FetchConfig {
        /// 0 disables the concurrency limit
        max_concurrent_requests: u16 = 0,
        cache_ttl_secs: u64 = DEFAULT_CACHE_TTL_SECS,
        /// Used when a 429 carries no usable Retry-After
        retry_delay_secs: u64 = DEFAULT_RETRY_DELAY_SECS,
    }
}

impl FetchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    pub struct Config {
        api: ApiConfig = ApiConfig::default(),
        fetch: FetchConfig = FetchConfig::default(),
    }
}
