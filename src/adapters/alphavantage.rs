//! AlphaVantage adapter: the HTTP fetch plus the shaping of its two payload
//! families (daily time series and realtime exchange-rate snapshot) into
//! normalized record batches.

use crate::core::columns::canonical_names;
use crate::domain::model::{RecordBatch, Row, Scalar};
use crate::domain::ports::MarketSource;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use std::cmp::Ordering;

pub struct AlphaVantageSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MarketSource for AlphaVantageSource {
    async fn fetch(&self, params: &[(String, String)]) -> Option<Value> {
        let mut query: Vec<(String, String)> = params.to_vec();
        query.push(("apikey".to_string(), self.api_key.clone()));

        tracing::debug!("fetching {} with {} parameters", self.base_url, params.len());
        let response = match self.client.get(&self.base_url).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("upstream request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("upstream returned status {}", response.status());
            return None;
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("upstream response is not JSON: {}", e);
                return None;
            }
        };

        // AlphaVantage reports throttling and bad requests as 200s with a
        // single explanatory key instead of data.
        if let Some(obj) = payload.as_object() {
            for marker in ["Error Message", "Note", "Information"] {
                if obj.contains_key(marker) {
                    tracing::warn!("upstream soft error: {}", marker);
                    return None;
                }
            }
        }

        Some(payload)
    }
}

/// Shapes a daily series payload (`"Time Series (Digital Currency Daily)"`
/// style) into one row per day, sorted ascending by `datetime`, with a
/// `date` partition column and an `ingestion_timestamp`. Returns `None`
/// when the payload has no usable series.
pub fn series_batch(payload: &Value) -> Option<RecordBatch> {
    let obj = payload.as_object()?;
    let (_, series) = obj.iter().find(|(k, _)| k.starts_with("Time Series"))?;
    let series = series.as_object()?;

    let ingested_at = Utc::now();
    let mut rows = Vec::new();

    for (day, fields) in series {
        let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
            tracing::warn!("skipping series entry with unparsable date '{}'", day);
            continue;
        };
        let Some(fields) = fields.as_object() else {
            continue;
        };

        let raw_names: Vec<String> = fields.keys().cloned().collect();
        let names = canonical_names(&raw_names);

        let mut row = Row::new();
        for (name, value) in names.iter().zip(fields.values()) {
            row.set(name.clone(), numeric_scalar(value));
        }
        row.set("datetime", Scalar::Date(date));
        row.set("date", Scalar::Str(day.clone()));
        row.set("ingestion_timestamp", Scalar::Timestamp(ingested_at));
        rows.push(row);
    }

    if rows.is_empty() {
        return None;
    }

    rows.sort_by(|a, b| {
        match (a.get("datetime"), b.get("datetime")) {
            (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        }
    });

    Some(RecordBatch::from_rows(rows))
}

/// Shapes a realtime exchange-rate payload into a single-row batch with
/// normalized, deduplicated column names.
pub fn snapshot_batch(payload: &Value) -> Option<RecordBatch> {
    let rate = payload
        .as_object()?
        .get("Realtime Currency Exchange Rate")?
        .as_object()?;

    let raw_names: Vec<String> = rate.keys().cloned().collect();
    let names = canonical_names(&raw_names);

    let mut row = Row::new();
    for (name, value) in names.iter().zip(rate.values()) {
        row.set(name.clone(), loose_scalar(value));
    }
    row.set("ingestion_timestamp", Scalar::Timestamp(Utc::now()));

    Some(RecordBatch::from_rows(vec![row]))
}

/// Quote fields arrive as strings; anything non-numeric becomes Null so the
/// caller's cleaning step can drop it.
fn numeric_scalar(value: &Value) -> Scalar {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float))
            .unwrap_or(Scalar::Null),
        Value::String(s) => s.trim().parse::<f64>().map(Scalar::Float).unwrap_or(Scalar::Null),
        _ => Scalar::Null,
    }
}

/// Snapshot fields mix quotes and labels; numeric-looking strings are
/// coerced, everything else stays textual.
fn loose_scalar(value: &Value) -> Scalar {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float))
            .unwrap_or(Scalar::Null),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) => Scalar::Float(f),
            Err(_) => Scalar::Str(s.clone()),
        },
        Value::Null => Scalar::Null,
        other => Scalar::Str(other.to_string()),
    }
}
