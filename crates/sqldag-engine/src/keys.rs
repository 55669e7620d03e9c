//! External key sources
//!
//! Keys come from a column of an existing CSV, usually the output of an earlier
//! job. Values are trimmed, blanks dropped, and duplicates removed keeping the
//! first occurrence.

use crate::error::{EngineError, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Trait for reading filter keys (dependency injection)
pub trait KeySource: Send + Sync {
    /// Ordered distinct non-empty keys of `column`, matched case-insensitively
    fn read_keys(&self, path: &Path, column: &str) -> Result<Vec<String>>;
}

/// Reads keys from a headed CSV file
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvKeySource;

impl KeySource for CsvKeySource {
    fn read_keys(&self, path: &Path, column: &str) -> Result<Vec<String>> {
        let file = std::fs::File::open(path).map_err(|e| EngineError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let index = find_column(&headers, column).ok_or_else(|| EngineError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for record in reader.records() {
            let record = record?;
            let Some(raw) = record.get(index) else {
                continue;
            };
            let key = raw.trim();
            if !key.is_empty() && seen.insert(key.to_string()) {
                keys.push(key.to_string());
            }
        }

        debug!(path = %path.display(), column, keys = keys.len(), "Read filter keys");
        Ok(keys)
    }
}

/// Exact header match first, then case-insensitive.
fn find_column(headers: &[String], column: &str) -> Option<usize> {
    headers.iter().position(|h| h == column).or_else(|| {
        let wanted = column.to_lowercase();
        headers.iter().position(|h| h.to_lowercase() == wanted)
    })
}

/// Concatenate keys from several sources, keeping the first occurrence of each.
pub fn merge_keys(lists: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for key in lists.into_iter().flatten() {
        if seen.insert(key.clone()) {
            merged.push(key);
        }
    }
    merged
}
