use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One typed cell value. Nulls, numbers, and strings serialize as their
/// plain JSON forms; temporal values are wrapped in a single-key object
/// (`{"$date": ...}`, `{"$timestamp": ...}`) so that a persisted `Str`
/// holding a date-shaped string reads back as `Str`, never as `Date`.
/// Variant identity matters: key tuples and ordering comparisons are
/// per-variant, so a round trip through storage must not retype.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Str(String),
}

#[derive(Serialize, Deserialize)]
enum Temporal {
    #[serde(rename = "$timestamp")]
    Timestamp(DateTime<Utc>),
    #[serde(rename = "$date")]
    Date(NaiveDate),
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Int(v) => v.serialize(serializer),
            Scalar::Float(v) => v.serialize(serializer),
            Scalar::Timestamp(v) => Temporal::Timestamp(*v).serialize(serializer),
            Scalar::Date(v) => Temporal::Date(*v).serialize(serializer),
            Scalar::Str(v) => v.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarRepr {
    Null,
    Int(i64),
    Float(f64),
    Temporal(Temporal),
    Str(String),
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match ScalarRepr::deserialize(deserializer)? {
            ScalarRepr::Null => Scalar::Null,
            ScalarRepr::Int(v) => Scalar::Int(v),
            ScalarRepr::Float(v) => Scalar::Float(v),
            ScalarRepr::Temporal(Temporal::Timestamp(v)) => Scalar::Timestamp(v),
            ScalarRepr::Temporal(Temporal::Date(v)) => Scalar::Date(v),
            ScalarRepr::Str(v) => Scalar::Str(v),
        })
    }
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Key-tuple component for exact-equality matching. `None` for Null:
    /// a null key value never matches anything, not even another null.
    pub(crate) fn key_part(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Int(v) => Some(format!("i:{}", v)),
            Scalar::Float(v) => Some(format!("f:{}", v)),
            Scalar::Timestamp(v) => Some(format!("t:{}", v.to_rfc3339())),
            Scalar::Date(v) => Some(format!("d:{}", v)),
            Scalar::Str(v) => Some(format!("s:{}", v)),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Str(a), Str(b)) => a.partial_cmp(b),
            // Cross-type comparison is undefined; callers treat it as
            // "not greater" when filtering against a watermark.
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Scalar::Date(v) => write!(f, "{}", v),
            Scalar::Str(v) => write!(f, "{}", v),
        }
    }
}

/// One row: column name to typed value. BTreeMap keeps output deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Row {
    #[serde(flatten)]
    pub values: BTreeMap<String, Scalar>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Scalar) {
        self.values.insert(column.into(), value);
    }

    /// Exact key tuple over `key_columns`, or `None` if any component is
    /// missing or null (such a row can never match another row).
    pub fn key_tuple(&self, key_columns: &[String]) -> Option<String> {
        let mut parts = Vec::with_capacity(key_columns.len());
        for col in key_columns {
            parts.push(self.get(col)?.key_part()?);
        }
        Some(parts.join("\u{1f}"))
    }
}

/// An ordered batch of rows sharing one normalized column set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordBatch {
    pub rows: Vec<Row>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect()
    }

    /// Maximum value of `column` across the batch, skipping nulls and values
    /// that do not compare. This is the watermark of a persisted state.
    pub fn max_of(&self, column: &str) -> Option<Scalar> {
        let mut max: Option<Scalar> = None;
        for row in &self.rows {
            let Some(value) = row.get(column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match &max {
                None => max = Some(value.clone()),
                Some(current) => {
                    if matches!(value.partial_cmp(current), Some(Ordering::Greater)) {
                        max = Some(value.clone());
                    }
                }
            }
        }
        max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Raw,
    Clean,
    Aggregate,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Clean => "clean",
            Layer::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    Overwrite,
    Upsert,
    IncrementalAppend,
}

/// Physical location of one logical dataset as seen by the storage gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub layer: Layer,
    pub source: String,
    pub entity: String,
}

impl TableId {
    pub fn new(layer: Layer, source: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            layer,
            source: source.into(),
            entity: entity.into(),
        }
    }

    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.layer, self.source, self.entity)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Identifies one logical dataset and its merge policy. Immutable once
/// defined; created at pipeline configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub source: String,
    pub layer: Layer,
    pub entity: String,
    #[serde(default)]
    pub key_columns: Vec<String>,
    #[serde(default)]
    pub partition_columns: Vec<String>,
    pub policy: MergePolicy,
}

impl DatasetDescriptor {
    pub fn table_id(&self) -> TableId {
        TableId::new(self.layer, self.source.clone(), self.entity.clone())
    }

    /// By convention the first key column orders an incrementally appended
    /// dataset.
    pub fn ordering_column(&self) -> Option<&str> {
        self.key_columns.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

/// What one `MergeEngine::apply` call did to table state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Bootstrap: the table did not exist and was created from the batch.
    Created { rows: usize },
    /// Full replacement of the previous state.
    Replaced { rows: usize },
    /// Upsert against existing state.
    Merged { updated: usize, inserted: usize },
    /// Incremental append above the watermark.
    Appended { appended: usize, filtered: usize },
    /// Nothing to do; no write was issued.
    Unchanged,
}

#[derive(Debug, Clone)]
pub enum DatasetStatus {
    Succeeded(MergeOutcome),
    Failed(String),
    /// A required upstream dataset has never been populated. Not an error.
    SkippedMissingInput { missing: String },
    /// The remote source returned nothing usable; table state untouched.
    UpstreamFailure,
}

#[derive(Debug, Clone)]
pub struct DatasetReport {
    pub dataset: String,
    pub table: TableId,
    pub status: DatasetStatus,
}

/// Per-run record of what happened to each dataset. The caller inspects it
/// to decide on retries or alerts; nothing here aborts the run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub entries: Vec<DatasetReport>,
}

impl RunReport {
    pub fn push(&mut self, entry: DatasetReport) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, other: RunReport) {
        self.entries.extend(other.entries);
    }

    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, DatasetStatus::Succeeded(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, DatasetStatus::Failed(_)))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}
