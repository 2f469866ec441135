//! The standard market run: AlphaVantage daily crypto series plus a
//! realtime exchange-rate snapshot, landed raw → clean → aggregate.

use crate::adapters::alphavantage::{series_batch, snapshot_batch};
use crate::config::run_config::MarketParams;
use crate::core::merge::MergeEngine;
use crate::core::pipeline::{DatasetTransform, LayerPipeline};
use crate::core::registry::DescriptorRegistry;
use crate::domain::model::{
    DatasetDescriptor, DatasetReport, DatasetStatus, Layer, MergePolicy, RecordBatch, RunReport,
    Scalar,
};
use crate::domain::ports::{MarketSource, StorageGateway};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const SOURCE_NAME: &str = "alphavantage";

/// All datasets of the standard run, registered once at startup.
pub fn standard_registry() -> Result<DescriptorRegistry> {
    let mut registry = DescriptorRegistry::new();

    registry.register(
        "crypto_daily",
        DatasetDescriptor {
            source: SOURCE_NAME.to_string(),
            layer: Layer::Raw,
            entity: "crypto_daily".to_string(),
            key_columns: vec!["datetime".to_string()],
            partition_columns: vec!["date".to_string()],
            policy: MergePolicy::Upsert,
        },
    )?;
    registry.register(
        "exchange_rate",
        DatasetDescriptor {
            source: SOURCE_NAME.to_string(),
            layer: Layer::Raw,
            entity: "exchange_rate".to_string(),
            key_columns: vec![],
            partition_columns: vec![],
            policy: MergePolicy::Overwrite,
        },
    )?;
    registry.register(
        "crypto_daily_clean",
        DatasetDescriptor {
            source: SOURCE_NAME.to_string(),
            layer: Layer::Clean,
            entity: "crypto_daily_clean".to_string(),
            key_columns: vec!["datetime".to_string()],
            partition_columns: vec!["date".to_string()],
            policy: MergePolicy::IncrementalAppend,
        },
    )?;
    registry.register(
        "exchange_rate_clean",
        DatasetDescriptor {
            source: SOURCE_NAME.to_string(),
            layer: Layer::Clean,
            entity: "exchange_rate_clean".to_string(),
            key_columns: vec!["last_refreshed".to_string()],
            partition_columns: vec![],
            policy: MergePolicy::Upsert,
        },
    )?;
    registry.register(
        "crypto_monthly_summary",
        DatasetDescriptor {
            source: SOURCE_NAME.to_string(),
            layer: Layer::Aggregate,
            entity: "crypto_monthly_summary".to_string(),
            key_columns: vec!["month".to_string()],
            partition_columns: vec![],
            policy: MergePolicy::Upsert,
        },
    )?;
    registry.register(
        "exchange_rate_latest",
        DatasetDescriptor {
            source: SOURCE_NAME.to_string(),
            layer: Layer::Aggregate,
            entity: "exchange_rate_latest".to_string(),
            key_columns: vec![],
            partition_columns: vec![],
            policy: MergePolicy::Overwrite,
        },
    )?;

    Ok(registry)
}

pub struct MarketEtl<G: StorageGateway + ?Sized, S: MarketSource> {
    source: S,
    engine: MergeEngine<G>,
    pipeline: LayerPipeline<G>,
    params: MarketParams,
    monitor: SystemMonitor,
    crypto_daily: DatasetDescriptor,
    exchange_rate: DatasetDescriptor,
    crypto_daily_clean: DatasetDescriptor,
    exchange_rate_clean: DatasetDescriptor,
    crypto_monthly_summary: DatasetDescriptor,
    exchange_rate_latest: DatasetDescriptor,
}

impl<G: StorageGateway + ?Sized, S: MarketSource> MarketEtl<G, S> {
    pub fn new(gateway: Arc<G>, source: S, params: MarketParams) -> Result<Self> {
        let registry = standard_registry()?;
        Ok(Self {
            source,
            engine: MergeEngine::new(gateway.clone()),
            pipeline: LayerPipeline::new(gateway),
            params,
            monitor: SystemMonitor::new(false),
            crypto_daily: registry.require("crypto_daily")?.clone(),
            exchange_rate: registry.require("exchange_rate")?.clone(),
            crypto_daily_clean: registry.require("crypto_daily_clean")?.clone(),
            exchange_rate_clean: registry.require("exchange_rate_clean")?.clone(),
            crypto_monthly_summary: registry.require("crypto_monthly_summary")?.clone(),
            exchange_rate_latest: registry.require("exchange_rate_latest")?.clone(),
        })
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    /// One full run. Every dataset is attempted; failures land in the
    /// report instead of aborting.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();

        tracing::info!("raw layer: ingesting from upstream");
        report.push(self.ingest_crypto_daily().await);
        report.push(self.ingest_exchange_rate().await);
        self.monitor.log_phase("raw layer");

        report.extend(
            self.pipeline
                .run(Layer::Clean, &self.clean_transforms())
                .await,
        );
        self.monitor.log_phase("clean layer");

        report.extend(
            self.pipeline
                .run(Layer::Aggregate, &self.aggregate_transforms())
                .await,
        );
        self.monitor.log_phase("aggregate layer");
        self.monitor.log_final();

        report
    }

    async fn ingest_crypto_daily(&self) -> DatasetReport {
        let params = vec![
            ("function".to_string(), "DIGITAL_CURRENCY_DAILY".to_string()),
            ("symbol".to_string(), self.params.symbol.clone()),
            ("market".to_string(), self.params.market.clone()),
        ];

        let status = match self.source.fetch(&params).await.and_then(|p| series_batch(&p)) {
            None => DatasetStatus::UpstreamFailure,
            Some(batch) => {
                let cleaned = valid_quotes(batch);
                match self.engine.apply(&self.crypto_daily, cleaned).await {
                    Ok(outcome) => DatasetStatus::Succeeded(outcome),
                    Err(e) => DatasetStatus::Failed(e.to_string()),
                }
            }
        };

        DatasetReport {
            dataset: "crypto_daily".to_string(),
            table: self.crypto_daily.table_id(),
            status,
        }
    }

    async fn ingest_exchange_rate(&self) -> DatasetReport {
        let params = vec![
            ("function".to_string(), "CURRENCY_EXCHANGE_RATE".to_string()),
            ("from_currency".to_string(), self.params.from_currency.clone()),
            ("to_currency".to_string(), self.params.to_currency.clone()),
        ];

        let status = match self.source.fetch(&params).await.and_then(|p| snapshot_batch(&p)) {
            None => DatasetStatus::UpstreamFailure,
            Some(batch) => match self.engine.apply(&self.exchange_rate, batch).await {
                Ok(outcome) => DatasetStatus::Succeeded(outcome),
                Err(e) => DatasetStatus::Failed(e.to_string()),
            },
        };

        DatasetReport {
            dataset: "exchange_rate".to_string(),
            table: self.exchange_rate.table_id(),
            status,
        }
    }

    fn clean_transforms(&self) -> Vec<DatasetTransform> {
        vec![
            DatasetTransform::new(
                "crypto_daily_clean",
                self.crypto_daily_clean.clone(),
                Box::new(clean_crypto),
            )
            .with_input("crypto", self.crypto_daily.table_id())
            .with_optional_input("fx", self.exchange_rate.table_id()),
            DatasetTransform::new(
                "exchange_rate_clean",
                self.exchange_rate_clean.clone(),
                Box::new(clean_fx),
            )
            .with_input("fx", self.exchange_rate.table_id()),
        ]
    }

    fn aggregate_transforms(&self) -> Vec<DatasetTransform> {
        vec![
            DatasetTransform::new(
                "crypto_monthly_summary",
                self.crypto_monthly_summary.clone(),
                Box::new(monthly_summary),
            )
            .with_input("crypto_clean", self.crypto_daily_clean.table_id()),
            DatasetTransform::new(
                "exchange_rate_latest",
                self.exchange_rate_latest.clone(),
                Box::new(latest_fx),
            )
            .with_input("fx_clean", self.exchange_rate_clean.table_id()),
        ]
    }
}

/// Raw-layer cleaning for the daily series: rows need a datetime and a
/// positive close.
pub fn valid_quotes(batch: RecordBatch) -> RecordBatch {
    let rows = batch
        .rows
        .into_iter()
        .filter(|row| {
            let has_datetime = row.get("datetime").is_some_and(|v| !v.is_null());
            let positive_close = row
                .get("close")
                .and_then(Scalar::as_f64)
                .is_some_and(|c| c > 0.0);
            has_datetime && positive_close
        })
        .collect();
    RecordBatch::from_rows(rows)
}

/// Clean-layer derivation for the crypto series: valid quotes only, a
/// `month` column, and `close_fx` when a usable exchange rate is present.
pub fn clean_crypto(inputs: &HashMap<String, RecordBatch>) -> Result<RecordBatch> {
    let crypto = inputs.get("crypto").cloned().unwrap_or_default();
    let fx_rate = inputs.get("fx").and_then(extract_fx_rate);

    let mut rows = Vec::new();
    for mut row in valid_quotes(crypto).rows {
        let Some(month) = row.get("datetime").and_then(month_of) else {
            continue;
        };
        row.set("month", Scalar::Str(month));
        if let Some(rate) = fx_rate {
            if let Some(close) = row.get("close").and_then(Scalar::as_f64) {
                row.set("close_fx", Scalar::Float(close * rate));
            }
        }
        rows.push(row);
    }

    Ok(RecordBatch::from_rows(rows))
}

/// Clean-layer derivation for the FX snapshot: names are already
/// normalized at shaping time, so this is a passthrough; the upsert on
/// `last_refreshed` accumulates one row per refresh instant.
pub fn clean_fx(inputs: &HashMap<String, RecordBatch>) -> Result<RecordBatch> {
    Ok(inputs.get("fx").cloned().unwrap_or_default())
}

/// Aggregate-layer derivation: monthly avg/max/min of close.
pub fn monthly_summary(inputs: &HashMap<String, RecordBatch>) -> Result<RecordBatch> {
    let clean = inputs.get("crypto_clean").cloned().unwrap_or_default();

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in &clean.rows {
        let Some(month) = row.get("month").and_then(Scalar::as_str) else {
            continue;
        };
        let Some(close) = row.get("close").and_then(Scalar::as_f64) else {
            continue;
        };
        groups.entry(month.to_string()).or_default().push(close);
    }

    let mut rows = Vec::new();
    for (month, closes) in groups {
        let avg = closes.iter().sum::<f64>() / closes.len() as f64;
        let max = closes.iter().cloned().fold(f64::MIN, f64::max);
        let min = closes.iter().cloned().fold(f64::MAX, f64::min);

        let mut row = crate::domain::model::Row::new();
        row.set("month", Scalar::Str(month));
        row.set("avg_close", Scalar::Float(avg));
        row.set("max_close", Scalar::Float(max));
        row.set("min_close", Scalar::Float(min));
        rows.push(row);
    }

    Ok(RecordBatch::from_rows(rows))
}

/// Aggregate-layer derivation: the single most recent FX row.
pub fn latest_fx(inputs: &HashMap<String, RecordBatch>) -> Result<RecordBatch> {
    let clean = inputs.get("fx_clean").cloned().unwrap_or_default();

    let latest = clean
        .rows
        .iter()
        .filter(|r| r.get("last_refreshed").is_some_and(|v| !v.is_null()))
        .max_by(|a, b| {
            let x = a.get("last_refreshed");
            let y = b.get("last_refreshed");
            match (x, y) {
                (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
                _ => std::cmp::Ordering::Equal,
            }
        })
        .cloned();

    Ok(RecordBatch::from_rows(latest.into_iter().collect()))
}

/// Last usable numeric value from the first rate-like column.
fn extract_fx_rate(batch: &RecordBatch) -> Option<f64> {
    let candidate = batch
        .columns()
        .into_iter()
        .find(|c| c.contains("rate") || c.contains("exchange"))?;
    batch
        .rows
        .iter()
        .rev()
        .find_map(|row| row.get(&candidate).and_then(Scalar::as_f64))
}

fn month_of(value: &Scalar) -> Option<String> {
    match value {
        Scalar::Date(d) => Some(d.format("%Y-%m").to_string()),
        Scalar::Timestamp(t) => Some(t.format("%Y-%m").to_string()),
        Scalar::Str(s) if s.len() >= 7 => Some(s[..7].to_string()),
        _ => None,
    }
}
