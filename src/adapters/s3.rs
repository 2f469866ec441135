#[cfg(feature = "s3")]
use crate::domain::model::{RecordBatch, Row, TableId, WriteMode};
#[cfg(feature = "s3")]
use crate::domain::ports::StorageGateway;
#[cfg(feature = "s3")]
use crate::utils::error::{LakeError, Result};
#[cfg(feature = "s3")]
use async_trait::async_trait;
#[cfg(feature = "s3")]
use aws_sdk_s3::operation::get_object::GetObjectError;
#[cfg(feature = "s3")]
use aws_sdk_s3::Client as S3Client;

#[cfg(feature = "s3")]
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub prefix: String,
}

/// Object-store gateway: same JSON Lines layout as the local gateway,
/// keyed `<prefix>/<layer>/<source>/<entity>.jsonl` inside one bucket.
/// A put is atomic per object, which is exactly the visibility the merge
/// engine's staged single-write contract needs.
#[cfg(feature = "s3")]
#[derive(Debug, Clone)]
pub struct S3Gateway {
    client: S3Client,
    bucket: String,
    prefix: String,
}

#[cfg(feature = "s3")]
impl S3Gateway {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    /// Builds a client from explicit settings, resolved once at startup.
    pub async fn connect(settings: &S3Settings) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "lake-etl",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;

        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Ok(Self::new(
            S3Client::from_conf(conf),
            settings.bucket.clone(),
            settings.prefix.clone(),
        ))
    }

    fn key_for(&self, table: &TableId) -> String {
        if self.prefix.is_empty() {
            format!("{}.jsonl", table.path())
        } else {
            format!("{}/{}.jsonl", self.prefix.trim_end_matches('/'), table.path())
        }
    }

    fn parse(table: &TableId, bytes: &[u8]) -> Result<RecordBatch> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| LakeError::storage(table.path(), format!("malformed table: {}", e)))?;
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

    fn render(batch: &RecordBatch) -> Result<Vec<u8>> {
        let mut content = String::new();
        for row in &batch.rows {
            content.push_str(&serde_json::to_string(row)?);
            content.push('\n');
        }
        Ok(content.into_bytes())
    }
}

#[cfg(feature = "s3")]
#[async_trait]
impl StorageGateway for S3Gateway {
    async fn read(&self, table: &TableId) -> Result<Option<RecordBatch>> {
        let key = self.key_for(table);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        let output = match resp {
            Ok(output) => output,
            Err(err) => {
                return match err.into_service_error() {
                    GetObjectError::NoSuchKey(_) => Ok(None),
                    other => Err(LakeError::storage(
                        table.path(),
                        format!("read failed: {}", other),
                    )),
                }
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| LakeError::storage(table.path(), format!("read failed: {}", e)))?;
        Self::parse(table, &data.into_bytes()).map(Some)
    }

    async fn write(
        &self,
        table: &TableId,
        batch: &RecordBatch,
        mode: WriteMode,
        partition_columns: &[String],
    ) -> Result<()> {
        if !partition_columns.is_empty() {
            tracing::debug!(
                "table {} partitioned by {:?} (flat layout in object store)",
                table,
                partition_columns
            );
        }

        let staged = match mode {
            WriteMode::Overwrite => batch.clone(),
            WriteMode::Append => {
                let mut current = self.read(table).await?.unwrap_or_default();
                current.rows.extend(batch.rows.iter().cloned());
                current
            }
        };

        let body = Self::render(&staged)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key_for(table))
            .body(body.into())
            .send()
            .await
            .map_err(|e| LakeError::storage(table.path(), format!("write failed: {}", e)))?;
        Ok(())
    }
}
