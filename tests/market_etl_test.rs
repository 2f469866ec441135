//! End-to-end runs of the standard market pipeline against a mocked
//! upstream API and a local-disk gateway.

use httpmock::prelude::*;
use lake_etl::domain::model::{DatasetStatus, Layer, MergeOutcome, Scalar, TableId};
use lake_etl::domain::ports::StorageGateway;
use lake_etl::{AlphaVantageSource, LocalGateway, MarketEtl, MarketParams};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn series_body() -> serde_json::Value {
    json!({
        "Meta Data": {"2. Digital Currency Code": "BTC"},
        "Time Series (Digital Currency Daily)": {
            "2024-01-01": {
                "1. open": "99.0",
                "4. close": "100.0",
                "5. volume": "1000"
            },
            "2024-01-02": {
                "1. open": "101.0",
                "4. close": "105.0",
                "5. volume": "1200"
            }
        }
    })
}

fn snapshot_body() -> serde_json::Value {
    json!({
        "Realtime Currency Exchange Rate": {
            "1. From_Currency Code": "USD",
            "3. To_Currency Code": "EUR",
            "5. Exchange Rate": "0.91000000",
            "6. Last Refreshed": "2024-01-02 10:00:00"
        }
    })
}

fn mock_upstream(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "DIGITAL_CURRENCY_DAILY");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(series_body());
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "CURRENCY_EXCHANGE_RATE");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(snapshot_body());
    });
}

fn etl(server: &MockServer, dir: &TempDir) -> MarketEtl<LocalGateway, AlphaVantageSource> {
    let gateway = Arc::new(LocalGateway::new(dir.path()));
    let source = AlphaVantageSource::new(server.url("/query"), "demo");
    MarketEtl::new(gateway, source, MarketParams::default()).unwrap()
}

fn status_of<'a>(
    report: &'a lake_etl::RunReport,
    dataset: &str,
) -> &'a DatasetStatus {
    &report
        .entries
        .iter()
        .find(|e| e.dataset == dataset)
        .unwrap_or_else(|| panic!("no report entry for {}", dataset))
        .status
}

#[tokio::test]
async fn test_first_run_populates_all_layers() {
    let server = MockServer::start();
    mock_upstream(&server);
    let dir = TempDir::new().unwrap();

    let report = etl(&server, &dir).run().await;

    assert_eq!(report.entries.len(), 6);
    assert_eq!(report.succeeded(), 6);
    assert!(matches!(
        status_of(&report, "crypto_daily"),
        DatasetStatus::Succeeded(MergeOutcome::Created { rows: 2 })
    ));
    assert!(matches!(
        status_of(&report, "exchange_rate"),
        DatasetStatus::Succeeded(MergeOutcome::Replaced { rows: 1 })
    ));
    assert!(matches!(
        status_of(&report, "crypto_daily_clean"),
        DatasetStatus::Succeeded(MergeOutcome::Created { rows: 2 })
    ));

    let gateway = LocalGateway::new(dir.path());
    let clean = gateway
        .read(&TableId::new(Layer::Clean, "alphavantage", "crypto_daily_clean"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(clean.len(), 2);
    // FX enrichment applied from the snapshot: 100 * 0.91.
    assert_eq!(clean.rows[0].get("close_fx"), Some(&Scalar::Float(91.0)));
    assert_eq!(clean.rows[0].get("month"), Some(&Scalar::Str("2024-01".into())));

    let monthly = gateway
        .read(&TableId::new(
            Layer::Aggregate,
            "alphavantage",
            "crypto_monthly_summary",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(
        monthly.rows[0].get("avg_close"),
        Some(&Scalar::Float(102.5))
    );

    let latest = gateway
        .read(&TableId::new(
            Layer::Aggregate,
            "alphavantage",
            "exchange_rate_latest",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(
        latest.rows[0].get("exchange_rate"),
        Some(&Scalar::Float(0.91))
    );
}

#[tokio::test]
async fn test_second_run_does_not_reprocess_history() {
    let server = MockServer::start();
    mock_upstream(&server);
    let dir = TempDir::new().unwrap();

    etl(&server, &dir).run().await;
    let report = etl(&server, &dir).run().await;

    assert_eq!(report.succeeded(), 6);
    // Same history upstream: the clean layer is entirely below the
    // watermark and the monthly summary recomputes to an identical state.
    assert!(matches!(
        status_of(&report, "crypto_daily_clean"),
        DatasetStatus::Succeeded(MergeOutcome::Unchanged)
    ));
    assert!(matches!(
        status_of(&report, "crypto_monthly_summary"),
        DatasetStatus::Succeeded(MergeOutcome::Unchanged)
    ));
    // The raw upsert matched both keys; nothing was inserted.
    assert!(matches!(
        status_of(&report, "crypto_daily"),
        DatasetStatus::Succeeded(MergeOutcome::Merged {
            updated: 2,
            inserted: 0
        })
    ));

    let gateway = LocalGateway::new(dir.path());
    let raw = gateway
        .read(&TableId::new(Layer::Raw, "alphavantage", "crypto_daily"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw.len(), 2);

    let clean = gateway
        .read(&TableId::new(Layer::Clean, "alphavantage", "crypto_daily_clean"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(clean.len(), 2);
    // The already-processed close keeps its original value.
    assert_eq!(clean.rows[1].get("close"), Some(&Scalar::Float(105.0)));
}

#[tokio::test]
async fn test_upstream_failure_leaves_state_untouched_and_is_isolated() {
    let server = MockServer::start();
    // Series endpoint is down; snapshot endpoint works.
    server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "DIGITAL_CURRENCY_DAILY");
        then.status(500);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "CURRENCY_EXCHANGE_RATE");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(snapshot_body());
    });

    let dir = TempDir::new().unwrap();
    let report = etl(&server, &dir).run().await;

    assert_eq!(report.failed(), 0);
    assert!(matches!(
        status_of(&report, "crypto_daily"),
        DatasetStatus::UpstreamFailure
    ));
    // The crypto chain is skipped, never failed.
    assert!(matches!(
        status_of(&report, "crypto_daily_clean"),
        DatasetStatus::SkippedMissingInput { .. }
    ));
    assert!(matches!(
        status_of(&report, "crypto_monthly_summary"),
        DatasetStatus::SkippedMissingInput { .. }
    ));
    // The FX chain is unaffected.
    assert!(matches!(
        status_of(&report, "exchange_rate"),
        DatasetStatus::Succeeded(_)
    ));
    assert!(matches!(
        status_of(&report, "exchange_rate_latest"),
        DatasetStatus::Succeeded(_)
    ));

    let gateway = LocalGateway::new(dir.path());
    let raw = gateway
        .read(&TableId::new(Layer::Raw, "alphavantage", "crypto_daily"))
        .await
        .unwrap();
    assert!(raw.is_none());
}

#[tokio::test]
async fn test_new_history_appends_above_watermark() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();

    // First run with two days of history.
    let mut first_series = server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "DIGITAL_CURRENCY_DAILY");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(series_body());
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "CURRENCY_EXCHANGE_RATE");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(snapshot_body());
    });
    etl(&server, &dir).run().await;
    first_series.delete();

    // Second run: upstream revises 2024-01-02 and adds 2024-01-03.
    server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("function", "DIGITAL_CURRENCY_DAILY");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "Time Series (Digital Currency Daily)": {
                    "2024-01-02": {"1. open": "101.0", "4. close": "999.0", "5. volume": "1200"},
                    "2024-01-03": {"1. open": "106.0", "4. close": "110.0", "5. volume": "900"}
                }
            }));
    });
    let report = etl(&server, &dir).run().await;

    assert!(matches!(
        status_of(&report, "crypto_daily_clean"),
        DatasetStatus::Succeeded(MergeOutcome::Appended {
            appended: 1,
            filtered: 2
        })
    ));

    let gateway = LocalGateway::new(dir.path());
    let clean = gateway
        .read(&TableId::new(Layer::Clean, "alphavantage", "crypto_daily_clean"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(clean.len(), 3);
    // The revised 2024-01-02 close sits below the watermark and is not
    // reprocessed into the clean layer; only 2024-01-03 lands.
    assert_eq!(clean.rows[1].get("close"), Some(&Scalar::Float(105.0)));
    assert_eq!(clean.rows[2].get("close"), Some(&Scalar::Float(110.0)));
}
