//! The layer pipeline: drives merge-engine invocations across the
//! raw → clean → aggregate layers, feeding each transform the persisted
//! output of the layers before it.

use crate::core::merge::MergeEngine;
use crate::domain::model::{
    DatasetDescriptor, DatasetReport, DatasetStatus, Layer, RecordBatch, RunReport, TableId,
};
use crate::domain::ports::StorageGateway;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;

pub type TransformFn =
    Box<dyn Fn(&HashMap<String, RecordBatch>) -> Result<RecordBatch> + Send + Sync>;

/// Pairs a dataset descriptor with a pure derivation over upstream state.
/// Required inputs that have never been populated skip the transform;
/// optional inputs are passed through only when present.
pub struct DatasetTransform {
    pub name: String,
    pub descriptor: DatasetDescriptor,
    required: Vec<(String, TableId)>,
    optional: Vec<(String, TableId)>,
    apply: TransformFn,
}

impl DatasetTransform {
    pub fn new(
        name: impl Into<String>,
        descriptor: DatasetDescriptor,
        apply: TransformFn,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: Vec::new(),
            optional: Vec::new(),
            apply,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, table: TableId) -> Self {
        self.required.push((name.into(), table));
        self
    }

    pub fn with_optional_input(mut self, name: impl Into<String>, table: TableId) -> Self {
        self.optional.push((name.into(), table));
        self
    }
}

pub struct LayerPipeline<G: StorageGateway + ?Sized> {
    gateway: Arc<G>,
    engine: MergeEngine<G>,
}

impl<G: StorageGateway + ?Sized> LayerPipeline<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        let engine = MergeEngine::new(gateway.clone());
        Self { gateway, engine }
    }

    /// Runs each transform in declared order. Later transforms may depend
    /// on state written by earlier ones within the same call, so ordering
    /// is strict and sequential. One dataset's failure is recorded and the
    /// run proceeds to the next dataset.
    pub async fn run(&self, layer: Layer, transforms: &[DatasetTransform]) -> RunReport {
        tracing::info!("running {} layer ({} datasets)", layer, transforms.len());
        let mut report = RunReport::default();

        for transform in transforms {
            let status = self.run_one(transform).await;
            match &status {
                DatasetStatus::Succeeded(outcome) => {
                    tracing::info!("dataset '{}': {:?}", transform.name, outcome)
                }
                DatasetStatus::Failed(reason) => {
                    tracing::error!("dataset '{}' failed: {}", transform.name, reason)
                }
                DatasetStatus::SkippedMissingInput { missing } => {
                    tracing::warn!(
                        "dataset '{}' skipped: upstream '{}' not yet populated",
                        transform.name,
                        missing
                    )
                }
                DatasetStatus::UpstreamFailure => {
                    tracing::warn!("dataset '{}': upstream failure", transform.name)
                }
            }
            report.push(DatasetReport {
                dataset: transform.name.clone(),
                table: transform.descriptor.table_id(),
                status,
            });
        }

        report
    }

    async fn run_one(&self, transform: &DatasetTransform) -> DatasetStatus {
        let mut inputs: HashMap<String, RecordBatch> = HashMap::new();

        for (name, table) in &transform.required {
            match self.gateway.read(table).await {
                Ok(Some(batch)) => {
                    inputs.insert(name.clone(), batch);
                }
                Ok(None) => {
                    return DatasetStatus::SkippedMissingInput {
                        missing: table.path(),
                    }
                }
                Err(e) => return DatasetStatus::Failed(e.to_string()),
            }
        }

        for (name, table) in &transform.optional {
            match self.gateway.read(table).await {
                Ok(Some(batch)) => {
                    inputs.insert(name.clone(), batch);
                }
                Ok(None) => {}
                Err(e) => return DatasetStatus::Failed(e.to_string()),
            }
        }

        let derived = match (transform.apply)(&inputs) {
            Ok(batch) => batch,
            Err(e) => return DatasetStatus::Failed(e.to_string()),
        };

        match self.engine.apply(&transform.descriptor, derived).await {
            Ok(outcome) => DatasetStatus::Succeeded(outcome),
            Err(e) => DatasetStatus::Failed(e.to_string()),
        }
    }
}
