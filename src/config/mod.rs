/// Configuration system
///
/// - `macros`: the `config_struct!` declaration macro
/// - `schemas`: config sections with their defaults
/// - `utils`: TOML loading, environment overrides, validation
#[macro_use]
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{ApiConfig, Config, FetchConfig};
pub use utils::{apply_env_overrides, load_config_from_path, CONFIG_FILE_PATH};
