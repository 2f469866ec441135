use crate::utils::error::{LakeError, Result};
use crate::utils::validation::{
    validate_bucket_name, validate_non_empty_string, validate_path, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-run configuration, loaded once from a TOML file. The storage
/// backend is resolved into a gateway at startup and never re-probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub market: MarketParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        path: String,
    },
    S3 {
        bucket: String,
        access_key: String,
        secret_key: String,
        #[serde(default = "default_region")]
        region: String,
        endpoint: Option<String>,
        #[serde(default)]
        prefix: String,
    },
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketParams {
    pub symbol: String,
    pub market: String,
    pub from_currency: String,
    pub to_currency: String,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            symbol: "BTC".to_string(),
            market: "USD".to_string(),
            from_currency: "USD".to_string(),
            to_currency: "EUR".to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LakeError::ConfigError {
            message: format!("cannot read config file '{}': {}", path.display(), e),
        })?;
        toml::from_str(&content).map_err(|e| LakeError::ConfigError {
            message: format!("invalid config file '{}': {}", path.display(), e),
        })
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api.base_url", &self.api.base_url)?;
        validate_non_empty_string("api.api_key", &self.api.api_key)?;

        match &self.storage {
            StorageConfig::Local { path } => validate_path("storage.path", path)?,
            StorageConfig::S3 {
                bucket,
                access_key,
                secret_key,
                endpoint,
                ..
            } => {
                validate_bucket_name("storage.bucket", bucket)?;
                validate_non_empty_string("storage.access_key", access_key)?;
                validate_non_empty_string("storage.secret_key", secret_key)?;
                if let Some(endpoint) = endpoint {
                    validate_url("storage.endpoint", endpoint)?;
                }
            }
        }

        validate_non_empty_string("market.symbol", &self.market.symbol)?;
        validate_non_empty_string("market.market", &self.market.market)?;
        Ok(())
    }
}
