/// In-memory response caching
///
/// `TimedCache` is a leaf component: a generic map whose entries expire after a
/// per-insert TTL. The fetch coordinator keys it by the literal URL string.
pub mod timed_cache;

pub use timed_cache::{CacheEntry, CacheMetrics, TimedCache};
