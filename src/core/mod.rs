pub mod columns;
pub mod merge;
pub mod pipeline;
pub mod registry;

pub use crate::domain::model::{
    DatasetDescriptor, DatasetReport, DatasetStatus, Layer, MergeOutcome, MergePolicy,
    RecordBatch, Row, RunReport, Scalar, TableId, WriteMode,
};
pub use crate::domain::ports::{MarketSource, StorageGateway};
pub use crate::utils::error::Result;
pub use merge::MergeEngine;
pub use pipeline::{DatasetTransform, LayerPipeline, TransformFn};
pub use registry::DescriptorRegistry;
