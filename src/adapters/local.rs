use crate::domain::model::{RecordBatch, Row, TableId, WriteMode};
use crate::domain::ports::StorageGateway;
use crate::utils::error::{LakeError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Local-disk gateway: one JSON Lines file per table under a root
/// directory, laid out as `<layer>/<source>/<entity>.jsonl`. Writes go
/// through a temp file and a rename, so a reader observes either the old
/// state or the whole new state.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    root: PathBuf,
}

impl LocalGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_path(&self, table: &TableId) -> PathBuf {
        self.root.join(format!("{}.jsonl", table.path()))
    }

    fn load(&self, table: &TableId, path: &Path) -> Result<RecordBatch> {
        let content = fs::read_to_string(path)
            .map_err(|e| LakeError::storage(table.path(), format!("read failed: {}", e)))?;

        let mut rows = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(line).map_err(|e| {
                LakeError::storage(table.path(), format!("malformed table: {}", e))
            })?;
            rows.push(row);
        }
        Ok(RecordBatch::from_rows(rows))
    }

    fn store(&self, table: &TableId, path: &Path, batch: &RecordBatch) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LakeError::storage(table.path(), format!("mkdir failed: {}", e)))?;
        }

        let mut content = String::new();
        for row in &batch.rows {
            let line = serde_json::to_string(row)?;
            content.push_str(&line);
            content.push('\n');
        }

        let tmp = path.with_extension("jsonl.tmp");
        fs::write(&tmp, content)
            .map_err(|e| LakeError::storage(table.path(), format!("write failed: {}", e)))?;
        fs::rename(&tmp, path)
            .map_err(|e| LakeError::storage(table.path(), format!("commit failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for LocalGateway {
    async fn read(&self, table: &TableId) -> Result<Option<RecordBatch>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(None);
        }
        self.load(table, &path).map(Some)
    }

    async fn write(
        &self,
        table: &TableId,
        batch: &RecordBatch,
        mode: WriteMode,
        partition_columns: &[String],
    ) -> Result<()> {
        let path = self.table_path(table);
        if !partition_columns.is_empty() {
            tracing::debug!(
                "table {} partitioned by {:?} (flat layout on local disk)",
                table,
                partition_columns
            );
        }

        let staged = match mode {
            WriteMode::Overwrite => batch.clone(),
            WriteMode::Append => {
                let mut current = if path.exists() {
                    self.load(table, &path)?
                } else {
                    RecordBatch::new()
                };
                current.rows.extend(batch.rows.iter().cloned());
                current
            }
        };

        self.store(table, &path, &staged)
    }
}
