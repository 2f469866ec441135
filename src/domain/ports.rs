use crate::domain::model::{RecordBatch, TableId, WriteMode};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Collaborator interface over the transactional table store.
///
/// `read` returns `Ok(None)` when a table has never been written; that is
/// the defined bootstrap condition, never an error. `write` must be atomic:
/// a subsequent read observes either the previous state or the whole new
/// state, never a partial write.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn read(&self, table: &TableId) -> Result<Option<RecordBatch>>;

    async fn write(
        &self,
        table: &TableId,
        batch: &RecordBatch,
        mode: WriteMode,
        partition_columns: &[String],
    ) -> Result<()>;
}

/// Upstream data source. Any transport error, non-success status or
/// malformed body collapses to `None`: "no data this run", never a crash.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch(&self, params: &[(String, String)]) -> Option<serde_json::Value>;
}
