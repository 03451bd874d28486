//! Zone grouping and the durable outputs of a run: one dataset per qualifying
//! zone, the inventory report, and the enrichment failure report.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::{info, instrument, warn};

use crate::constants::zone_file_name;
use crate::enrich::EnrichmentFailure;
use crate::error::OutputError;
use crate::metrics::OutputMetrics;
use crate::schema::Schema;
use crate::types::CleanedRecord;

/// One inventory line: a zone and how many cleaned rows it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRow {
    pub zipcode: String,
    pub records_num: usize,
}

/// What [`ZoneWriter::write_zones`] did with each zone.
#[derive(Debug, Clone, Default)]
pub struct ZoneOutcome {
    /// Every observed zone, written or not, sorted by postal code.
    pub inventory: Vec<InventoryRow>,
    pub written: Vec<PathBuf>,
    pub skipped: Vec<String>,
}

/// Group cleaned rows by the postal code column; zones come out sorted.
pub fn group_by_zone(
    records: Vec<CleanedRecord>,
    postal_code_column: usize,
) -> BTreeMap<String, Vec<CleanedRecord>> {
    let mut zones: BTreeMap<String, Vec<CleanedRecord>> = BTreeMap::new();
    for record in records {
        let zone = record.text(postal_code_column).unwrap_or_default().to_string();
        zones.entry(zone).or_default().push(record);
    }
    zones
}

/// Serializes one record as a JSON object in schema column order.
struct NamedRecord<'a> {
    schema: &'a Schema,
    record: &'a CleanedRecord,
}

impl Serialize for NamedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.schema.len()))?;
        for (idx, column) in self.schema.columns().iter().enumerate() {
            map.serialize_entry(column, self.record.value(idx))?;
        }
        map.end()
    }
}

struct ZoneDataset<'a> {
    schema: &'a Schema,
    records: &'a [CleanedRecord],
}

impl Serialize for ZoneDataset<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in self.records {
            seq.serialize_element(&NamedRecord {
                schema: self.schema,
                record,
            })?;
        }
        seq.end()
    }
}

/// Postal codes are never checked to be numeric, so a zone must not carry path
/// separators or characters that file systems reject.
fn is_file_safe(zone: &str) -> bool {
    const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    !zone.is_empty() && !zone.chars().any(|c| c.is_control() || RESERVED.contains(&c))
}

/// Persists zones that reach the size threshold.
pub struct ZoneWriter {
    dir: PathBuf,
    schema: Arc<Schema>,
    min_records: usize,
}

impl ZoneWriter {
    pub fn new(dir: impl Into<PathBuf>, schema: Arc<Schema>, min_records: usize) -> Self {
        Self {
            dir: dir.into(),
            schema,
            min_records,
        }
    }

    /// Write every zone with at least `min_records` rows; record all zones in the inventory.
    #[instrument(skip_all, fields(dir = %self.dir.display(), zones = zones.len()))]
    pub fn write_zones(
        &self,
        zones: &BTreeMap<String, Vec<CleanedRecord>>,
    ) -> Result<ZoneOutcome, OutputError> {
        fs::create_dir_all(&self.dir).map_err(|source| OutputError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut outcome = ZoneOutcome::default();
        for (zone, records) in zones {
            outcome.inventory.push(InventoryRow {
                zipcode: zone.clone(),
                records_num: records.len(),
            });
            if records.len() >= self.min_records {
                if !is_file_safe(zone) {
                    warn!(
                        zone = %zone,
                        records = records.len(),
                        "zone name is not usable as a file name, skipped"
                    );
                    OutputMetrics::record_zone_skipped();
                    outcome.skipped.push(zone.clone());
                    continue;
                }
                let path = self.write_zone(zone, records)?;
                OutputMetrics::record_zone_written(records.len());
                outcome.written.push(path);
            } else {
                println!("{} only has {} records", zone, records.len());
                info!(zone = %zone, records = records.len(), "zone below threshold, skipped");
                OutputMetrics::record_zone_skipped();
                outcome.skipped.push(zone.clone());
            }
        }
        Ok(outcome)
    }

    fn write_zone(&self, zone: &str, records: &[CleanedRecord]) -> Result<PathBuf, OutputError> {
        let path = self.dir.join(zone_file_name(zone));
        let io_err = |source| OutputError::Io {
            path: path.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
        let dataset = ZoneDataset {
            schema: &self.schema,
            records,
        };
        serde_json::to_writer(&mut writer, &dataset).map_err(|source| OutputError::Json {
            zone: zone.to_string(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
        info!(zone = %zone, records = records.len(), file = %path.display(), "zone written");
        Ok(path)
    }
}

fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), OutputError> {
    let csv_err = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    // Header written by hand so an empty report still carries it
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Inventory report with header `zipcode,records_num`.
pub fn write_inventory(path: &Path, rows: &[InventoryRow]) -> Result<(), OutputError> {
    write_csv(path, &["zipcode", "records_num"], rows)?;
    info!(file = %path.display(), zones = rows.len(), "inventory written");
    Ok(())
}

pub fn write_failure_report(path: &Path, failures: &[EnrichmentFailure]) -> Result<(), OutputError> {
    write_csv(
        path,
        &["row", "latitude", "longitude", "reason", "retryable"],
        failures,
    )?;
    info!(file = %path.display(), failures = failures.len(), "enrichment failure report written");
    Ok(())
}
