pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_effective_config};
pub use schema::{CdnConfig, Config, StorageConfig, ToolsConfig, CONFIG_VERSION, MAX_ZOOM};
