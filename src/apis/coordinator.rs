/// Concurrency-bounded, rate-limit-aware GET coordinator
///
/// Sits between callers and a [`Transport`]:
/// - successful responses are cached per literal URL for a fixed TTL
/// - a shared retry deadline pauses every new dispatch after any HTTP 429
/// - an optional permit pool bounds the number of in-flight requests
///
/// 429 responses are absorbed with unbounded wait-and-retry. Every other
/// failure is returned to the caller unchanged and never retried.
use super::transport::{HttpResponse, ReqwestTransport, Transport};
use super::retry_after::parse_retry_after;
use super::stats::{ApiStats, ApiStatsTracker};
use crate::cache::TimedCache;
use crate::config::schemas::MAX_RETRY_DELAY_SECS;
use crate::config::{Config, FetchConfig};
use crate::errors::{FetchError, FetchResult};
use crate::logger::{self, LogTag};
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cache of successful responses keyed by the literal request URL
pub type ResponseCache = TimedCache<String, HttpResponse>;

/// RAII guard for one admission slot; the permit returns to the pool on drop
pub struct AdmissionGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

pub struct FetchCoordinator {
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache>,
    admission: Option<Arc<Semaphore>>,
    max_concurrent_requests: u16,
    /// Earliest instant any new request may be dispatched
    retry_deadline: Mutex<Instant>,
    cache_ttl: Duration,
    retry_delay: Duration,
    stats: ApiStatsTracker,
}

impl FetchCoordinator {
    /// Create a coordinator with its own cache
    ///
    /// `max_concurrent_requests == 0` disables admission control.
    pub fn new(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        let admission = match config.max_concurrent_requests {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n as usize))),
        };

        Self {
            transport,
            cache: Arc::new(ResponseCache::new()),
            admission,
            max_concurrent_requests: config.max_concurrent_requests,
            retry_deadline: Mutex::new(Instant::now()),
            cache_ttl: config.cache_ttl(),
            retry_delay: config.retry_delay(),
            stats: ApiStatsTracker::new(),
        }
    }

    /// Build the reqwest transport from `config` and wrap it
    pub fn from_config(config: &Config) -> FetchResult<Self> {
        config.fetch.validate()?;
        let transport = ReqwestTransport::new(&config.api)?;
        Ok(Self::new(Arc::new(transport), &config.fetch))
    }

    /// Share an existing cache instead of the coordinator's own
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Fetch `url`, serving from cache when a live entry exists
    ///
    /// A cache hit returns immediately: no deadline wait, no permit, no
    /// network call. On a miss the request waits out the shared retry
    /// deadline, takes an admission permit, then loops on the transport until
    /// a non-429 response arrives. Only successful responses are cached.
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> FetchResult<HttpResponse> {
        let mut missed = false;
        let result = self
            .cache
            .get_or_try_insert_with(url.to_string(), self.cache_ttl, || {
                missed = true;
                self.fetch_uncached(url, cancel)
            })
            .await;

        if missed {
            self.stats.record_cache_miss();
            logger::debug(LogTag::Cache, &format!("Cache miss for {}", url));
        } else {
            self.stats.record_cache_hit();
            logger::debug(LogTag::Cache, &format!("Cache hit for {}", url));
        }

        result
    }

    /// Fetch through the cache and decode the JSON body
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<T> {
        let response = self.fetch(url, cancel).await?;
        response.json().map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_uncached(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<HttpResponse> {
        // Wait before taking a permit so throttled callers don't hold one idle
        self.wait_for_retry_deadline(url, cancel).await?;

        let _admission = self.admit(url, cancel).await?;

        if cancel.is_cancelled() {
            return Err(cancelled(url));
        }

        loop {
            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(url)),
                result = self.transport.get(url) => result,
            };
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    self.stats.record_request(false, elapsed_ms);
                    self.stats.record_error(err.to_string());
                    return Err(err);
                }
            };

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                self.stats.record_rate_limited(elapsed_ms);
                let wait = parse_retry_after(&response.headers, Utc::now())
                    .unwrap_or(self.retry_delay);
                drop(response);

                self.push_retry_deadline(wait);
                logger::warning(
                    LogTag::Fetch,
                    &format!(
                        "HTTP 429 for {}, pausing all requests for {:.1}s",
                        url,
                        wait.as_secs_f64()
                    ),
                );

                // Sleep on the shared deadline so concurrent 429s converge
                self.wait_for_retry_deadline(url, cancel).await?;
                continue;
            }

            if !response.is_success() {
                self.stats.record_request(false, elapsed_ms);
                self.stats
                    .record_error(format!("HTTP {} from {}", response.status, url));
                logger::warning(
                    LogTag::Fetch,
                    &format!("HTTP {} for {}", response.status, url),
                );
                return Err(FetchError::Status {
                    status: response.status,
                    url: url.to_string(),
                });
            }

            self.stats.record_request(true, elapsed_ms);
            return Ok(response);
        }
    }

    /// Suspend until the shared retry deadline has passed
    async fn wait_for_retry_deadline(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<()> {
        let deadline = *self.retry_deadline.lock();
        if deadline <= Instant::now() {
            return Ok(());
        }

        logger::debug(
            LogTag::Fetch,
            &format!(
                "Waiting {:.1}s for retry deadline before {}",
                deadline.saturating_duration_since(Instant::now()).as_secs_f64(),
                url
            ),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled(url)),
            _ = tokio::time::sleep_until(deadline) => Ok(()),
        }
    }

    /// Acquire an admission permit, if a pool is configured
    async fn admit(&self, url: &str, cancel: &CancellationToken) -> FetchResult<AdmissionGuard> {
        let semaphore = match &self.admission {
            Some(semaphore) => semaphore.clone(),
            None => return Ok(AdmissionGuard { _permit: None }),
        };

        if semaphore.available_permits() == 0 {
            logger::debug(
                LogTag::Fetch,
                &format!(
                    "All {} permits busy, queueing {}",
                    self.max_concurrent_requests, url
                ),
            );
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(url)),
            permit = semaphore.acquire_owned() => permit.map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: format!("admission pool closed: {}", e),
            })?,
        };

        Ok(AdmissionGuard {
            _permit: Some(permit),
        })
    }

    /// Waits are capped at `MAX_RETRY_DELAY_SECS` so the deadline stays schedulable
    fn push_retry_deadline(&self, wait: Duration) {
        let wait = wait.min(Duration::from_secs(MAX_RETRY_DELAY_SECS));
        *self.retry_deadline.lock() = Instant::now() + wait;
    }

    /// Current shared retry deadline
    pub fn retry_deadline(&self) -> Instant {
        *self.retry_deadline.lock()
    }

    /// Free admission slots; `None` when concurrency is unbounded
    pub fn available_permits(&self) -> Option<usize> {
        self.admission.as_ref().map(|s| s.available_permits())
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Drop expired cache entries; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let removed = self.cache.remove_expired();
        if removed > 0 {
            logger::debug(
                LogTag::Cache,
                &format!("Swept {} expired responses ({} left)", removed, self.cache.len()),
            );
        }
        removed
    }

    pub fn get_stats(&self) -> ApiStats {
        self.stats.get_stats()
    }
}

fn cancelled(url: &str) -> FetchError {
    FetchError::Cancelled {
        url: url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::testing::{ok, status, too_many_requests, ScriptedTransport, Step};

    fn config(max_concurrent_requests: u16) -> FetchConfig {
        FetchConfig {
            max_concurrent_requests,
            ..FetchConfig::default()
        }
    }

    fn coordinator(
        transport: &Arc<ScriptedTransport>,
        max_concurrent_requests: u16,
    ) -> Arc<FetchCoordinator> {
        Arc::new(FetchCoordinator::new(
            transport.clone(),
            &config(max_concurrent_requests),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_fetch_hits_cache() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok(r#"{"id":1}"#))));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        let first = coordinator.fetch("groups", &cancel).await.unwrap();
        for _ in 0..5 {
            let again = coordinator.fetch("groups", &cancel).await.unwrap();
            assert_eq!(again.body, first.body);
        }

        assert_eq!(transport.call_count(), 1);
        let stats = coordinator.get_stats();
        assert_eq!(stats.cache_hits, 5);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.successful_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches_once() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok("{}"))));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        coordinator.fetch("groups", &cancel).await.unwrap();
        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        coordinator.fetch("groups", &cancel).await.unwrap();
        assert_eq!(transport.call_count(), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        coordinator.fetch("groups", &cancel).await.unwrap();
        coordinator.fetch("groups", &cancel).await.unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_urls_are_cached_separately() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok("{}"))));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        coordinator.fetch("groups", &cancel).await.unwrap();
        coordinator.fetch("groups?cursor=abc", &cancel).await.unwrap();
        coordinator.fetch("groups", &cancel).await.unwrap();

        assert_eq!(transport.call_count(), 2);
        assert_eq!(coordinator.cache().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_with_retry_after_then_success() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(Some("2")))],
            Step::Respond(ok(r#"{"ok":true}"#)),
        ));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let response = coordinator.fetch("groups", &cancel).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(transport.call_count(), 2);

        let stats = coordinator.get_stats();
        assert_eq!(stats.rate_limited_responses, 1);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.failed_requests, 0);

        // The success obtained after retrying is cached like any other
        coordinator.fetch("groups", &cancel).await.unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_without_retry_after_uses_default_delay() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(None))],
            Step::Respond(ok("{}")),
        ));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        coordinator.fetch("groups", &cancel).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].at - calls[0].at >= Duration::from_secs(60));
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_429s_retry_until_success() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                Step::Respond(too_many_requests(Some("1"))),
                Step::Respond(too_many_requests(Some("1"))),
                Step::Respond(too_many_requests(Some("1"))),
            ],
            Step::Respond(ok("{}")),
        ));
        let coordinator = coordinator(&transport, 1);
        let cancel = CancellationToken::new();

        coordinator.fetch("groups", &cancel).await.unwrap();
        assert_eq!(transport.call_count(), 4);
        assert_eq!(coordinator.get_stats().rate_limited_responses, 3);
        assert_eq!(coordinator.available_permits(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_deadline_is_shared_across_urls() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(Some("5")))],
            Step::Respond(ok("{}")),
        ));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        let first = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { coordinator.fetch("groups/a", &cancel).await })
        };

        // Let the first fetch receive its 429 and enter backoff
        tokio::time::sleep(Duration::from_millis(100)).await;
        let deadline = coordinator.retry_deadline();
        assert!(deadline > Instant::now());

        coordinator.fetch("groups/b", &cancel).await.unwrap();
        first.await.unwrap().unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        let second_url_call = calls.iter().find(|c| c.url == "groups/b").unwrap();
        assert!(second_url_call.at >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_429_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(status(404))));
        let coordinator = coordinator(&transport, 2);
        let cancel = CancellationToken::new();

        let err = coordinator.fetch("groups/missing", &cancel).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(transport.call_count(), 1);

        // Failures are not cached: the next call goes to the network again
        coordinator.fetch("groups/missing", &cancel).await.unwrap_err();
        assert_eq!(transport.call_count(), 2);
        assert_eq!(coordinator.available_permits(), Some(2));
        assert_eq!(coordinator.get_stats().failed_requests, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_surfaced() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(status(503))));
        let coordinator = coordinator(&transport, 0);

        let err = coordinator
            .fetch("groups", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_propagates_unchanged() {
        let transport = Arc::new(ScriptedTransport::always(Step::Fail(
            "connection reset".to_string(),
        )));
        let coordinator = coordinator(&transport, 1);

        let err = coordinator
            .fetch("groups", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport { ref message, .. } if message == "connection reset"
        ));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(coordinator.available_permits(), Some(1));
        assert!(coordinator.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_bounds_in_flight_requests() {
        let transport = Arc::new(ScriptedTransport::always(Step::Hang));
        let coordinator = coordinator(&transport, 3);
        let cancel = CancellationToken::new();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let coordinator = coordinator.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    coordinator
                        .fetch(&format!("connectors/{}/schemas", i), &cancel)
                        .await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.in_flight(), 3);
        assert_eq!(transport.max_in_flight(), 3);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(coordinator.available_permits(), Some(0));

        cancel.cancel();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap_err().is_cancelled());
        }
        assert_eq!(transport.in_flight(), 0);
        assert_eq!(coordinator.available_permits(), Some(3));
        assert!(coordinator.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_completes_all_requests() {
        let transport = Arc::new(ScriptedTransport::always(Step::Delay(
            Duration::from_millis(200),
            ok("{}"),
        )));
        let coordinator = coordinator(&transport, 2);
        let cancel = CancellationToken::new();

        let handles: Vec<_> = (0..7)
            .map(|i| {
                let coordinator = coordinator.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    coordinator
                        .fetch(&format!("groups/{}", i), &cancel)
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(transport.call_count(), 7);
        assert_eq!(transport.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_admission() {
        let transport = Arc::new(ScriptedTransport::always(Step::Hang));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();
        assert_eq!(coordinator.available_permits(), None);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let coordinator = coordinator.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    coordinator
                        .fetch(&format!("groups/{}", i), &cancel)
                        .await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.max_in_flight(), 20);

        cancel.cancel();
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_releases_permit() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(Some("30")))],
            Step::Respond(ok("{}")),
        ));
        let coordinator = coordinator(&transport, 1);
        let cancel = CancellationToken::new();

        let throttled = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { coordinator.fetch("groups", &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Backing off while still holding the only permit
        assert_eq!(coordinator.available_permits(), Some(0));

        cancel.cancel();
        let err = throttled.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(coordinator.available_permits(), Some(1));
        assert!(coordinator.cache().is_empty());
        assert_eq!(transport.call_count(), 1);

        // The freed permit is immediately usable once the deadline is lifted
        *coordinator.retry_deadline.lock() = Instant::now();
        let start = Instant::now();
        coordinator
            .fetch("users", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_retry_delay_is_capped() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(too_many_requests(
            None,
        ))));
        let config = FetchConfig {
            retry_delay_secs: u64::MAX,
            ..FetchConfig::default()
        };
        let coordinator = Arc::new(FetchCoordinator::new(transport.clone(), &config));
        let cancel = CancellationToken::new();

        let throttled = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { coordinator.fetch("groups", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let remaining = coordinator
            .retry_deadline()
            .saturating_duration_since(Instant::now());
        assert!(remaining > Duration::from_secs(60));
        assert!(remaining <= Duration::from_secs(MAX_RETRY_DELAY_SECS));

        cancel.cancel();
        assert!(throttled.await.unwrap().unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_after_header_is_capped_not_defaulted() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(Some("18446744073709551615")))],
            Step::Respond(ok("{}")),
        ));
        let coordinator = coordinator(&transport, 0);

        let start = Instant::now();
        coordinator
            .fetch("groups", &CancellationToken::new())
            .await
            .unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(MAX_RETRY_DELAY_SECS));
        assert!(waited < Duration::from_secs(MAX_RETRY_DELAY_SECS + 1));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_deadline() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(too_many_requests(Some("30")))],
            Step::Respond(ok("{}")),
        ));
        let coordinator = coordinator(&transport, 0);

        let background = CancellationToken::new();
        let first = {
            let coordinator = coordinator.clone();
            let cancel = background.clone();
            tokio::spawn(async move { coordinator.fetch("groups/a", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let cancel = CancellationToken::new();
        let second = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { coordinator.fetch("groups/b", &cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert!(second.await.unwrap().unwrap_err().is_cancelled());
        // groups/b never reached the transport
        assert!(transport.calls().iter().all(|c| c.url != "groups/b"));

        first.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_makes_no_call() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok("{}"))));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = coordinator.fetch("groups", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_ignores_cancellation_and_deadline() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok("{}"))));
        let coordinator = coordinator(&transport, 0);

        coordinator
            .fetch("groups", &CancellationToken::new())
            .await
            .unwrap();
        coordinator.push_retry_deadline(Duration::from_secs(600));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = Instant::now();
        coordinator.fetch("groups", &cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_decodes_and_reports_errors() {
        #[derive(Debug, serde::Deserialize)]
        struct Group {
            id: String,
        }

        let transport = Arc::new(ScriptedTransport::new(
            vec![Step::Respond(ok(r#"{"id":"g1"}"#))],
            Step::Respond(ok("not json")),
        ));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        let group: Group = coordinator.fetch_json("groups/g1", &cancel).await.unwrap();
        assert_eq!(group.id, "g1");

        let err = coordinator
            .fetch_json::<Group>("groups/g2", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_cache_between_coordinators() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok("{}"))));
        let cache = Arc::new(ResponseCache::new());
        let a = FetchCoordinator::new(transport.clone(), &config(0)).with_cache(cache.clone());
        let b = FetchCoordinator::new(transport.clone(), &config(0)).with_cache(cache.clone());
        let cancel = CancellationToken::new();

        a.fetch("groups", &cancel).await.unwrap();
        b.fetch("groups", &cancel).await.unwrap();
        assert_eq!(transport.call_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let transport = Arc::new(ScriptedTransport::always(Step::Respond(ok("{}"))));
        let coordinator = coordinator(&transport, 0);
        let cancel = CancellationToken::new();

        coordinator.fetch("groups/a", &cancel).await.unwrap();
        coordinator.fetch("groups/b", &cancel).await.unwrap();
        assert_eq!(coordinator.sweep_expired(), 0);

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(coordinator.sweep_expired(), 2);
        assert!(coordinator.cache().is_empty());
    }
}
