//! Reads the listing export parts into one unified dataset.
//!
//! Only the first part carries a header row. The remaining parts are read
//! headerless and every row must match the first part's column count.
//! Every part must be valid UTF-8.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{Reader, ReaderBuilder, StringRecord};
use tracing::{info, instrument};

use crate::error::LoadError;
use crate::metrics::LoadMetrics;
use crate::schema::Schema;
use crate::types::RawRecord;

/// All rows of every input part sharing one schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: Arc<Schema>,
    pub records: Vec<RawRecord>,
}

fn open_reader(path: &Path, has_headers: bool) -> Result<Reader<std::fs::File>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingInput(path.to_path_buf()));
    }
    ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn to_fields(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

/// Append every row of `reader` to `records`, numbering rows after what is already there.
fn append_rows(
    reader: &mut Reader<std::fs::File>,
    path: &Path,
    schema: &Schema,
    records: &mut Vec<RawRecord>,
) -> Result<usize, LoadError> {
    let before = records.len();
    let mut row = StringRecord::new();
    loop {
        // Invalid UTF-8 surfaces here as a csv error naming the position
        let more = reader.read_record(&mut row).map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if !more {
            break;
        }
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        schema.check_width(path, line, row.len())?;
        records.push(RawRecord::new(records.len(), to_fields(&row)));
    }
    Ok(records.len() - before)
}

/// Load `files` from `dir`: the first with headers, the rest positionally.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_listings(dir: &Path, files: &[String]) -> Result<Dataset, LoadError> {
    let (first, rest) = files.split_first().ok_or(LoadError::NoInputs)?;

    let first_path = dir.join(first);
    let mut reader = open_reader(&first_path, true)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: first_path.clone(),
            source,
        })?
        .clone();
    let schema = Schema::new(to_fields(&headers));
    if schema.is_empty() {
        return Err(LoadError::EmptySchema(first_path));
    }

    let mut records = Vec::new();
    let rows = append_rows(&mut reader, &first_path, &schema, &mut records)?;
    log_file(&first_path, rows);

    for name in rest {
        let path: PathBuf = dir.join(name);
        let mut reader = open_reader(&path, false)?;
        let rows = append_rows(&mut reader, &path, &schema, &mut records)?;
        log_file(&path, rows);
    }

    info!(
        files = files.len(),
        columns = schema.len(),
        rows = records.len(),
        "listings loaded"
    );
    Ok(Dataset {
        schema: Arc::new(schema),
        records,
    })
}

fn log_file(path: &Path, rows: usize) {
    LoadMetrics::record_file_loaded(rows);
    info!(file = %path.display(), rows, "read listings file");
}
