use lake_etl::domain::model::{Layer, RecordBatch, Row, Scalar, TableId, WriteMode};
use lake_etl::domain::ports::StorageGateway;
use lake_etl::{LakeError, LocalGateway};
use std::fs;
use tempfile::TempDir;

fn table() -> TableId {
    TableId::new(Layer::Raw, "alphavantage", "crypto_daily")
}

fn batch(values: &[(&str, f64)]) -> RecordBatch {
    let rows = values
        .iter()
        .map(|(date, close)| {
            let mut row = Row::new();
            row.set("date", Scalar::Str(date.to_string()));
            row.set("close", Scalar::Float(*close));
            row
        })
        .collect();
    RecordBatch::from_rows(rows)
}

#[tokio::test]
async fn test_absent_table_reads_as_none() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    let state = gateway.read(&table()).await.unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    let data = batch(&[("2024-01-01", 100.0), ("2024-01-02", 105.0)]);
    gateway
        .write(&table(), &data, WriteMode::Overwrite, &[])
        .await
        .unwrap();

    let state = gateway.read(&table()).await.unwrap().unwrap();
    assert_eq!(state, data);

    // Laid out as <layer>/<source>/<entity>.jsonl under the root.
    assert!(dir
        .path()
        .join("raw/alphavantage/crypto_daily.jsonl")
        .exists());
}

#[tokio::test]
async fn test_overwrite_replaces_previous_contents() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    gateway
        .write(&table(), &batch(&[("2024-01-01", 100.0)]), WriteMode::Overwrite, &[])
        .await
        .unwrap();
    let replacement = batch(&[("2024-02-01", 200.0)]);
    gateway
        .write(&table(), &replacement, WriteMode::Overwrite, &[])
        .await
        .unwrap();

    let state = gateway.read(&table()).await.unwrap().unwrap();
    assert_eq!(state, replacement);
}

#[tokio::test]
async fn test_append_extends_existing_contents() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    gateway
        .write(&table(), &batch(&[("2024-01-01", 100.0)]), WriteMode::Overwrite, &[])
        .await
        .unwrap();
    gateway
        .write(&table(), &batch(&[("2024-01-02", 105.0)]), WriteMode::Append, &[])
        .await
        .unwrap();

    let state = gateway.read(&table()).await.unwrap().unwrap();
    assert_eq!(state.len(), 2);
    assert_eq!(
        state.rows[1].get("date"),
        Some(&Scalar::Str("2024-01-02".into()))
    );
}

#[tokio::test]
async fn test_append_to_absent_table_creates_it() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    gateway
        .write(&table(), &batch(&[("2024-01-01", 100.0)]), WriteMode::Append, &[])
        .await
        .unwrap();

    let state = gateway.read(&table()).await.unwrap().unwrap();
    assert_eq!(state.len(), 1);
}

#[tokio::test]
async fn test_empty_table_is_present_but_empty() {
    // A table written with zero rows exists; that is distinct from absent.
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    gateway
        .write(&table(), &RecordBatch::new(), WriteMode::Overwrite, &[])
        .await
        .unwrap();

    let state = gateway.read(&table()).await.unwrap();
    assert_eq!(state, Some(RecordBatch::new()));
}

#[tokio::test]
async fn test_malformed_table_is_a_storage_failure() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    let path = dir.path().join("raw/alphavantage/crypto_daily.jsonl");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{not valid json\n").unwrap();

    let err = gateway.read(&table()).await.unwrap_err();
    assert!(matches!(err, LakeError::StorageFailure { .. }));
}

#[tokio::test]
async fn test_no_temp_file_left_behind() {
    let dir = TempDir::new().unwrap();
    let gateway = LocalGateway::new(dir.path());

    gateway
        .write(&table(), &batch(&[("2024-01-01", 100.0)]), WriteMode::Overwrite, &[])
        .await
        .unwrap();

    let parent = dir.path().join("raw/alphavantage");
    let leftovers: Vec<_> = fs::read_dir(parent)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
