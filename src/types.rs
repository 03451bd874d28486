use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// One listing row as read from CSV: every field is raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Position in the unified dataset; stable across enrichment and partitioning.
    pub row: usize,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new(row: usize, fields: Vec<String>) -> Self {
        Self { row, fields }
    }

    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn set_field(&mut self, index: usize, value: String) {
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
    }
}

/// A typed field value after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Int(v) => serializer.serialize_i64(*v),
            FieldValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        }
    }
}

static NULL_VALUE: FieldValue = FieldValue::Null;

/// A listing row after normalization, one value per schema column.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub row: usize,
    pub values: Vec<FieldValue>,
}

impl CleanedRecord {
    pub fn value(&self, index: usize) -> &FieldValue {
        self.values.get(index).unwrap_or(&NULL_VALUE)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.value(index).as_text()
    }
}
