/// Request statistics for the fetch layer
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of counters since the tracker was created
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiStats {
    /// Calls handed to the transport, 429s and failures included
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_responses: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub average_response_time_ms: f64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct ApiStatsTracker {
    inner: Mutex<StatsInner>,
}

#[derive(Default)]
struct StatsInner {
    stats: ApiStats,
    total_response_time_ms: f64,
}

impl ApiStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed transport call
    pub fn record_request(&self, success: bool, response_time_ms: f64) {
        let mut inner = self.inner.lock();
        inner.stats.total_requests += 1;
        if success {
            inner.stats.successful_requests += 1;
        } else {
            inner.stats.failed_requests += 1;
        }
        inner.total_response_time_ms += response_time_ms;
        inner.stats.average_response_time_ms =
            inner.total_response_time_ms / inner.stats.total_requests as f64;
    }

    /// A 429 counts as a request but neither as success nor failure
    pub fn record_rate_limited(&self, response_time_ms: f64) {
        let mut inner = self.inner.lock();
        inner.stats.total_requests += 1;
        inner.stats.rate_limited_responses += 1;
        inner.total_response_time_ms += response_time_ms;
        inner.stats.average_response_time_ms =
            inner.total_response_time_ms / inner.stats.total_requests as f64;
    }

    pub fn record_error(&self, message: String) {
        let mut inner = self.inner.lock();
        inner.stats.last_error = Some(message);
        inner.stats.last_error_at = Some(Utc::now());
    }

    pub fn record_cache_hit(&self) {
        self.inner.lock().stats.cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.inner.lock().stats.cache_misses += 1;
    }

    pub fn get_stats(&self) -> ApiStats {
        self.inner.lock().stats.clone()
    }
}
