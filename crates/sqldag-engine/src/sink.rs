//! Result sinks

use crate::error::{EngineError, Result};
use crate::table::ResultSet;
use std::path::Path;
use tracing::debug;

/// Trait for persisting a job's result (dependency injection)
pub trait ResultSink: Send + Sync {
    fn write(&self, result: &ResultSet, target: &Path) -> Result<()>;
}

/// UTF-8 CSV with a header row, `\n` line endings and no index column.
/// Parent directories are created as needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSink;

impl ResultSink for CsvSink {
    fn write(&self, result: &ResultSet, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }

        let file = std::fs::File::create(target).map_err(|e| EngineError::io(target, e))?;
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if !result.columns().is_empty() {
            writer.write_record(result.columns())?;
            for row in result.rows() {
                writer.write_record(row.iter().map(|v| v.to_string()))?;
            }
        }
        writer.flush().map_err(|e| EngineError::io(target, e))?;

        debug!(path = %target.display(), rows = result.len(), "Wrote CSV");
        Ok(())
    }
}
