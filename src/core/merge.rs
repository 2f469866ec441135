//! The merge engine: decides per dataset whether table state must be
//! created, incrementally merged, or fully replaced, and keeps repeated
//! runs idempotent.

use crate::domain::model::{
    DatasetDescriptor, MergeOutcome, MergePolicy, RecordBatch, Row, WriteMode,
};
use crate::domain::ports::StorageGateway;
use crate::utils::error::{LakeError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MergeEngine<G: StorageGateway + ?Sized> {
    gateway: Arc<G>,
}

impl<G: StorageGateway + ?Sized> MergeEngine<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Applies `incoming` to the dataset's table state under its merge
    /// policy. `incoming` is expected to be already normalized and cleaned
    /// by the caller; no business rules are re-validated here.
    ///
    /// The staged result is committed with a single gateway write, so a
    /// failure anywhere leaves the previous state intact.
    pub async fn apply(
        &self,
        descriptor: &DatasetDescriptor,
        incoming: RecordBatch,
    ) -> Result<MergeOutcome> {
        let table = descriptor.table_id();
        tracing::debug!(
            "merge apply: table={} policy={:?} incoming_rows={}",
            table,
            descriptor.policy,
            incoming.len()
        );

        match descriptor.policy {
            MergePolicy::Overwrite => self.overwrite(descriptor, incoming).await,
            MergePolicy::Upsert => self.upsert(descriptor, incoming).await,
            MergePolicy::IncrementalAppend => self.incremental_append(descriptor, incoming).await,
        }
    }

    /// Unconditional replacement. No read of prior state; the gateway's
    /// atomicity guarantee means a failed write never clobbers it.
    async fn overwrite(
        &self,
        descriptor: &DatasetDescriptor,
        incoming: RecordBatch,
    ) -> Result<MergeOutcome> {
        let table = descriptor.table_id();
        let rows = incoming.len();
        self.gateway
            .write(
                &table,
                &incoming,
                WriteMode::Overwrite,
                &descriptor.partition_columns,
            )
            .await?;
        Ok(MergeOutcome::Replaced { rows })
    }

    /// Update-if-key-matches, else insert. Rows present only in current
    /// state are left untouched; this never deletes. A row whose key tuple
    /// contains a null can never match and is always inserted.
    async fn upsert(
        &self,
        descriptor: &DatasetDescriptor,
        incoming: RecordBatch,
    ) -> Result<MergeOutcome> {
        if descriptor.key_columns.is_empty() {
            return Err(LakeError::MergeError {
                dataset: descriptor.table_id().path(),
                message: "upsert requires at least one key column".to_string(),
            });
        }

        let table = descriptor.table_id();
        let current = self.gateway.read(&table).await?;

        let Some(current) = current else {
            // Bootstrap: the whole incoming batch becomes the initial state.
            let rows = incoming.len();
            self.gateway
                .write(
                    &table,
                    &incoming,
                    WriteMode::Overwrite,
                    &descriptor.partition_columns,
                )
                .await?;
            return Ok(MergeOutcome::Created { rows });
        };

        let mut merged = current.clone();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, row) in merged.rows.iter().enumerate() {
            if let Some(key) = row.key_tuple(&descriptor.key_columns) {
                index.insert(key, i);
            }
        }

        let mut updated = 0;
        let mut inserted = 0;
        for row in incoming.rows {
            match row.key_tuple(&descriptor.key_columns) {
                Some(key) => match index.get(&key) {
                    Some(&i) => {
                        merged.rows[i] = row;
                        updated += 1;
                    }
                    None => {
                        index.insert(key, merged.rows.len());
                        merged.rows.push(row);
                        inserted += 1;
                    }
                },
                None => {
                    merged.rows.push(row);
                    inserted += 1;
                }
            }
        }

        if merged == current {
            tracing::debug!("merge apply: table={} already up to date", table);
            return Ok(MergeOutcome::Unchanged);
        }

        self.gateway
            .write(
                &table,
                &merged,
                WriteMode::Overwrite,
                &descriptor.partition_columns,
            )
            .await?;
        Ok(MergeOutcome::Merged { updated, inserted })
    }

    /// Append only rows strictly above the watermark of the persisted
    /// state, deduplicated by ordering value (last row in batch order wins).
    async fn incremental_append(
        &self,
        descriptor: &DatasetDescriptor,
        incoming: RecordBatch,
    ) -> Result<MergeOutcome> {
        let Some(ordering_column) = descriptor.ordering_column() else {
            return Err(LakeError::MergeError {
                dataset: descriptor.table_id().path(),
                message: "incremental append requires an ordering column".to_string(),
            });
        };

        let table = descriptor.table_id();
        let current = self.gateway.read(&table).await?;
        let watermark = current.as_ref().and_then(|b| b.max_of(ordering_column));

        match &watermark {
            Some(w) => tracing::debug!("merge apply: table={} watermark={}", table, w),
            None => tracing::debug!("merge apply: table={} no watermark, full history", table),
        }

        let incoming_rows = incoming.len();
        let mut fresh: Vec<Row> = Vec::new();
        for row in incoming.rows {
            let Some(value) = row.get(ordering_column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let above = match &watermark {
                Some(w) => matches!(value.partial_cmp(w), Some(Ordering::Greater)),
                None => true,
            };
            if above {
                fresh.push(row);
            }
        }

        let deduped = dedup_by_ordering(fresh, ordering_column);
        let appended = deduped.len();
        let filtered = incoming_rows - appended;

        if appended == 0 {
            return Ok(MergeOutcome::Unchanged);
        }

        let batch = RecordBatch::from_rows(deduped);
        match current {
            None => {
                self.gateway
                    .write(
                        &table,
                        &batch,
                        WriteMode::Overwrite,
                        &descriptor.partition_columns,
                    )
                    .await?;
                Ok(MergeOutcome::Created { rows: appended })
            }
            Some(_) => {
                self.gateway
                    .write(
                        &table,
                        &batch,
                        WriteMode::Append,
                        &descriptor.partition_columns,
                    )
                    .await?;
                Ok(MergeOutcome::Appended { appended, filtered })
            }
        }
    }
}

/// Collapses rows sharing an ordering value: the last row in batch order
/// wins, at the position of the first encounter.
fn dedup_by_ordering(rows: Vec<Row>, ordering_column: &str) -> Vec<Row> {
    let key_columns = vec![ordering_column.to_string()];
    let mut out: Vec<Row> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        match row.key_tuple(&key_columns) {
            Some(key) => match positions.get(&key) {
                Some(&i) => out[i] = row,
                None => {
                    positions.insert(key, out.len());
                    out.push(row);
                }
            },
            None => out.push(row),
        }
    }

    out
}
