/// HTTP transport: the response type, the transport seam and the reqwest client
use crate::config::ApiConfig;
use crate::errors::{FetchError, FetchResult};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use url::Url;

/// Buffered HTTP response
///
/// Cheap to clone (the body is reference counted), so one response can sit in
/// the cache and be handed out to many callers.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Header value as text, if present and valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Outbound GET capability the coordinator delegates to
///
/// Implementations accept absolute URLs and URLs relative to their own base.
/// Cancellation is expressed by dropping the returned future.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> FetchResult<HttpResponse>;
}

/// Resolve `target` against `base`; absolute targets are used as is
pub fn resolve_url(base: &Url, target: &str) -> FetchResult<Url> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: target.to_string(),
        reason,
    };

    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(target).map_err(|e| invalid(e.to_string()))?
        }
        Err(e) => return Err(invalid(e.to_string())),
    };

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

/// `Basic` credential token for the Authorization header
pub fn basic_auth_token(api_key: &str, api_secret: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", api_key, api_secret))
}

/// Production transport backed by reqwest
///
/// Pre-configured with base address, Basic authentication, JSON accept header,
/// a descriptive user agent and the request timeout.
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build the client, failing fast on unusable configuration
    pub fn new(config: &ApiConfig) -> FetchResult<Self> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;

        let mut auth = HeaderValue::from_str(&format!(
            "Basic {}",
            basic_auth_token(&config.api_key, &config.api_secret)
        ))
        .map_err(|e| FetchError::config("api.api_key", e.to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                FetchError::config("api", format!("failed to create HTTP client: {}", e))
            })?;

        logger::debug(
            LogTag::Transport,
            &format!(
                "HTTP client ready: base={}, timeout={}s, agent={}",
                base_url, config.timeout_secs, config.user_agent
            ),
        );

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let resolved = resolve_url(&self.base_url, url)?;

        logger::debug(LogTag::Transport, &format!("GET {}", resolved));

        let start = Instant::now();
        let response = self
            .client
            .get(resolved)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(url, e))?;

        logger::debug(
            LogTag::Transport,
            &format!(
                "GET {} -> {} ({} bytes, {}ms)",
                url,
                status,
                body.len(),
                start.elapsed().as_millis()
            ),
        );

        Ok(HttpResponse::new(status, headers, body))
    }
}
