pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::{MarketParams, RunConfig, StorageConfig};

pub use crate::adapters::{AlphaVantageSource, LocalGateway};
#[cfg(feature = "s3")]
pub use crate::adapters::{S3Gateway, S3Settings};
pub use crate::app::{standard_registry, MarketEtl};
pub use crate::core::{
    DatasetDescriptor, DatasetStatus, DatasetTransform, DescriptorRegistry, Layer, LayerPipeline,
    MergeEngine, MergeOutcome, MergePolicy, RecordBatch, Row, RunReport, Scalar, TableId,
};
pub use crate::domain::ports::{MarketSource, StorageGateway};
pub use crate::utils::error::{LakeError, Result};
