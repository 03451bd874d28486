use std::collections::HashMap;
use std::path::Path;

use crate::error::LoadError;

/// Column layout shared by every input file, taken from the header row of the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (pos, name) in columns.iter().enumerate() {
            // First occurrence wins for duplicated headers
            index.entry(name.clone()).or_insert(pos);
        }
        Self { columns, index }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Position of a column the pipeline cannot run without.
    pub fn require(&self, name: &str) -> Result<usize, LoadError> {
        self.position(name)
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    }

    /// Rejects a row whose width differs from the schema instead of misaligning it.
    pub fn check_width(&self, file: &Path, line: u64, found: usize) -> Result<(), LoadError> {
        if found == self.len() {
            Ok(())
        } else {
            Err(LoadError::SchemaMismatch {
                file: file.to_path_buf(),
                line,
                expected: self.len(),
                found,
            })
        }
    }
}
