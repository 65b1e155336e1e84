pub mod apis;
pub mod cache;
pub mod config;
pub mod errors;
pub mod logger;

pub use apis::{FetchCoordinator, HttpResponse, ReqwestTransport, Transport};
pub use cache::TimedCache;
pub use config::{load_config_from_path, Config};
pub use errors::{FetchError, FetchResult};
pub use tokio_util::sync::CancellationToken;
