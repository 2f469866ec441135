use thiserror::Error;

#[derive(Error, Debug)]
pub enum LakeError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage failure on table '{table}': {message}")]
    StorageFailure { table: String, message: String },

    #[error("Merge error for '{dataset}': {message}")]
    MergeError { dataset: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl LakeError {
    pub fn storage(table: impl Into<String>, message: impl Into<String>) -> Self {
        LakeError::StorageFailure {
            table: table.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LakeError>;
