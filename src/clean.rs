//! Row cleaning: region filter plus per-column normalization of one partition.

use tracing::debug;

use crate::constants::{
    CURRENCY_COLUMNS, DATE_COLUMNS, FEE_COLUMNS, GUEST_COUNT_COLUMN, POSTAL_CODE_COLUMN,
    REGION_COLUMN, TEXT_COLUMNS,
};
use crate::error::{CleanError, LoadError, NormalizeError};
use crate::normalize::{
    normalize_postal_code, parse_count, parse_currency, parse_date, parse_fee,
};
use crate::schema::Schema;
use crate::types::{CleanedRecord, FieldValue, RawRecord};

/// How a column is transformed during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Untouched text; blank becomes null.
    Text,
    /// Untouched text; blank stays blank.
    ForcedText,
    Currency,
    Fee,
    Count,
    PostalCode,
    Date,
}

/// Cleans partitions of raw records. Holds no mutable state, so one instance
/// can be shared by every worker.
#[derive(Debug, Clone)]
pub struct RowCleaner {
    region: String,
    region_column: usize,
    columns: Vec<(String, ColumnKind)>,
}

impl RowCleaner {
    /// Resolve every transformed column against the schema up front.
    pub fn new(schema: &Schema, region: impl Into<String>) -> Result<Self, LoadError> {
        let region_column = schema.require(REGION_COLUMN)?;
        let mut kinds = vec![ColumnKind::Text; schema.len()];

        let mut assign = |names: &[&str], kind: ColumnKind| -> Result<(), LoadError> {
            for name in names {
                kinds[schema.require(name)?] = kind;
            }
            Ok(())
        };
        assign(&TEXT_COLUMNS, ColumnKind::ForcedText)?;
        assign(&CURRENCY_COLUMNS, ColumnKind::Currency)?;
        assign(&FEE_COLUMNS, ColumnKind::Fee)?;
        assign(&[GUEST_COUNT_COLUMN], ColumnKind::Count)?;
        assign(&[POSTAL_CODE_COLUMN], ColumnKind::PostalCode)?;
        assign(&DATE_COLUMNS, ColumnKind::Date)?;

        let columns = schema
            .columns()
            .iter()
            .cloned()
            .zip(kinds)
            .collect();

        Ok(Self {
            region: region.into(),
            region_column,
            columns,
        })
    }

    pub fn in_region(&self, record: &RawRecord) -> bool {
        record.field(self.region_column) == self.region
    }

    pub fn clean_record(&self, record: RawRecord) -> Result<CleanedRecord, CleanError> {
        let row = record.row;
        let mut values = Vec::with_capacity(self.columns.len());
        for (idx, (name, kind)) in self.columns.iter().enumerate() {
            let raw = record.fields.get(idx).map(String::as_str);
            let value = convert(*kind, raw).map_err(|source| CleanError {
                row,
                column: name.clone(),
                source,
            })?;
            values.push(value);
        }
        Ok(CleanedRecord { row, values })
    }

    /// Keep the target region and normalize every surviving row.
    ///
    /// Rows are independent, so any split of the input cleans to the same set of rows.
    pub fn clean_partition(
        &self,
        partition: Vec<RawRecord>,
    ) -> Result<Vec<CleanedRecord>, CleanError> {
        let total = partition.len();
        let cleaned = partition
            .into_iter()
            .filter(|record| self.in_region(record))
            .map(|record| self.clean_record(record))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(total, kept = cleaned.len(), region = %self.region, "partition cleaned");
        Ok(cleaned)
    }
}

fn convert(kind: ColumnKind, raw: Option<&str>) -> Result<FieldValue, NormalizeError> {
    let value = match kind {
        ColumnKind::Text => match raw {
            Some(s) if !s.trim().is_empty() => FieldValue::Text(s.to_string()),
            _ => FieldValue::Null,
        },
        ColumnKind::ForcedText => FieldValue::Text(raw.unwrap_or("").to_string()),
        ColumnKind::Currency => parse_currency(raw)?.map_or(FieldValue::Null, FieldValue::Float),
        ColumnKind::Fee => FieldValue::Float(parse_fee(raw)?),
        ColumnKind::Count => parse_count(raw)?.unwrap_or(FieldValue::Null),
        ColumnKind::PostalCode => FieldValue::Text(normalize_postal_code(raw.unwrap_or(""))),
        ColumnKind::Date => parse_date(raw).map_or(FieldValue::Null, FieldValue::Date),
    };
    Ok(value)
}
