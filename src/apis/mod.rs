/// Outbound API access
///
/// - `transport`: the `Transport` seam and the reqwest-backed implementation
/// - `coordinator`: caching, admission control and 429 backoff on top of a transport
/// - `retry_after`: `Retry-After` header parsing
/// - `stats`: request counters shared by the coordinator
/// - `testing`: scripted transport for offline use
pub mod coordinator;
pub mod retry_after;
pub mod stats;
pub mod testing;
pub mod transport;

pub use coordinator::{AdmissionGuard, FetchCoordinator, ResponseCache};
pub use retry_after::parse_retry_after;
pub use stats::{ApiStats, ApiStatsTracker};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
