// medallion-core/src/domain/record/raw.rs

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::schema::EntityKind;

/// A raw cell: either a string or nothing. Blank strings collapse to `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawField {
    Present(String),
    Absent,
}

impl RawField {
    pub fn from_option<S: Into<String>>(value: Option<S>) -> Self {
        match value {
            Some(v) => {
                let v = v.into();
                if v.trim().is_empty() {
                    Self::Absent
                } else {
                    Self::Present(v)
                }
            }
            None => Self::Absent,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Present(s) => Some(s.as_str()),
            Self::Absent => None,
        }
    }
}

impl Serialize for RawField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Present(s) => serializer.serialize_str(s),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

/// One source row. Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    /// Arrival position inside the source batch (0-based). Doubles as the
    /// ordering key for duplicate resolution.
    pub seq: u64,
    pub fields: BTreeMap<String, RawField>,
}

static ABSENT: RawField = RawField::Absent;

impl RawRecord {
    pub fn new<K, V, I>(seq: u64, cells: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        let fields = cells
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_lowercase(), RawField::from_option(v)))
            .collect();
        Self { seq, fields }
    }

    /// Columns the source did not provide read as absent.
    pub fn get(&self, name: &str) -> &RawField {
        self.fields.get(name).unwrap_or(&ABSENT)
    }

    /// Original payload as JSON, kept verbatim on rejection.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.fields).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawBatch {
    pub table: String,
    /// Tag supplied by the source (file name + content digest for CSV).
    pub batch_id: String,
    pub rows: Vec<RawRecord>,
}

impl RawBatch {
    pub fn new(table: impl Into<String>, batch_id: impl Into<String>, rows: Vec<RawRecord>) -> Self {
        Self {
            table: table.into(),
            batch_id: batch_id.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bronze layer for one run: one batch per entity, replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct RawStore {
    batches: BTreeMap<EntityKind, Arc<RawBatch>>,
    forecasts: Option<Arc<RawBatch>>,
}

impl RawStore {
    pub fn replace(&mut self, kind: EntityKind, batch: RawBatch) {
        self.batches.insert(kind, Arc::new(batch));
    }

    pub fn replace_forecasts(&mut self, batch: Option<RawBatch>) {
        self.forecasts = batch.map(Arc::new);
    }

    pub fn batch(&self, kind: EntityKind) -> Option<Arc<RawBatch>> {
        self.batches.get(&kind).cloned()
    }

    pub fn forecasts(&self) -> Option<Arc<RawBatch>> {
        self.forecasts.clone()
    }

    pub fn row_count(&self, kind: EntityKind) -> usize {
        self.batches.get(&kind).map_or(0, |b| b.len())
    }
}
