//! Scripted transport for exercising the coordinator without a network
//!
//! Records every call with its timestamp and tracks how many calls are inside
//! the transport at once.

use super::transport::{HttpResponse, Transport};
use crate::errors::{FetchError, FetchResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// What the transport does for one call
#[derive(Debug, Clone)]
pub enum Step {
    Respond(HttpResponse),
    /// Respond after a delay (on the tokio clock)
    Delay(Duration, HttpResponse),
    /// Fail like a broken connection
    Fail(String),
    /// Never complete
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub at: Instant,
}

/// Transport that replays a script, then repeats a fallback step
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed inside the transport at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// Decrements the in-flight gauge even when the call future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            at: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.next_step() {
            Step::Respond(response) => Ok(response),
            Step::Delay(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Step::Fail(message) => Err(FetchError::Transport {
                url: url.to_string(),
                message,
            }),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// 200 with a JSON body
pub fn ok(body: &str) -> HttpResponse {
    HttpResponse::new(StatusCode::OK, HeaderMap::new(), body.to_string())
}

/// Empty response with the given status
pub fn status(code: u16) -> HttpResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::new(status, HeaderMap::new(), Vec::new())
}

/// 429, optionally carrying a Retry-After value
pub fn too_many_requests(retry_after: Option<&str>) -> HttpResponse {
    let mut headers = HeaderMap::new();
    if let Some(value) = retry_after.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(RETRY_AFTER, value);
    }
    HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, headers, Vec::new())
}
