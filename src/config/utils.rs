/// Configuration utilities - loading, environment overrides and validation
use super::schemas::{
    ApiConfig, Config, FetchConfig, MAX_CACHE_TTL_SECS, MAX_RETRY_DELAY_SECS,
};
use crate::errors::{FetchError, FetchResult};
use crate::logger::{self, LogTag};
use std::path::Path;
use url::Url;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "fivetran-fetch.toml";

pub const ENV_API_KEY: &str = "FIVETRAN_API_KEY";
pub const ENV_API_SECRET: &str = "FIVETRAN_API_SECRET";

/// Load configuration from a TOML file, then apply environment overrides
///
/// A missing file is not an error: defaults are used instead, so credentials
/// can come from the environment alone.
pub fn load_config_from_path(path: impl AsRef<Path>) -> FetchResult<Config> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FetchError::config(
                &path.display().to_string(),
                format!("failed to read config file: {}", e),
            )
        })?;
        toml::from_str::<Config>(&contents).map_err(|e| {
            FetchError::config(
                &path.display().to_string(),
                format!("failed to parse config file: {}", e),
            )
        })?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Override credentials from the environment
///
/// `lookup` is injected so tests don't have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
        config.api.api_key = key;
    }
    if let Some(secret) = lookup(ENV_API_SECRET).filter(|v| !v.trim().is_empty()) {
        config.api.api_secret = secret;
    }
}

impl ApiConfig {
    /// Reject settings that would make every request fail
    pub fn validate(&self) -> FetchResult<()> {
        if self.timeout_secs == 0 {
            return Err(FetchError::config(
                "api.timeout_secs",
                "timeout must be a positive value",
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(FetchError::config(
                "api.api_key",
                "API key cannot be empty or whitespace",
            ));
        }
        if self.api_secret.trim().is_empty() {
            return Err(FetchError::config(
                "api.api_secret",
                "API secret cannot be empty or whitespace",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(FetchError::config(
                "api.user_agent",
                "user agent cannot be empty",
            ));
        }
        self.parsed_base_url().map(|_| ())
    }

    /// Base URL with a guaranteed trailing slash
    ///
    /// Without it `Url::join` would replace the last path segment instead of
    /// appending to it.
    pub fn parsed_base_url(&self) -> FetchResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(FetchError::InvalidUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}

impl FetchConfig {
    /// Reject durations too large to schedule
    pub fn validate(&self) -> FetchResult<()> {
        if self.retry_delay_secs > MAX_RETRY_DELAY_SECS {
            return Err(FetchError::config(
                "fetch.retry_delay_secs",
                format!("must be at most {} seconds", MAX_RETRY_DELAY_SECS),
            ));
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(FetchError::config(
                "fetch.cache_ttl_secs",
                format!("must be at most {} seconds", MAX_CACHE_TTL_SECS),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> FetchResult<()> {
        self.api.validate()?;
        self.fetch.validate()
    }
}
