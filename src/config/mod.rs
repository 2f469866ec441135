#[cfg(feature = "cli")]
pub mod cli;
pub mod run_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use run_config::{ApiConfig, MarketParams, RunConfig, StorageConfig};
