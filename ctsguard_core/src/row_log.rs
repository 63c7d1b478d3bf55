//! CSV row log of high-pressure ticks.
//!
//! Rows are appended one at a time under an exclusive file lock. The header
//! is written only when the file is empty, so the log can span sessions.

use crate::{LogRow, Result, Zone};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A row in the CSV output
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow {
    timestamp: String,
    flexion_extension: f64,
    radial_ulnar: f64,
    pressure: f64,
    bad_posture_duration: f64,
    total_time: f64,
}

impl From<&LogRow> for CsvRow {
    fn from(row: &LogRow) -> Self {
        CsvRow {
            timestamp: row.timestamp.to_rfc3339(),
            flexion_extension: row.flexion_extension,
            radial_ulnar: row.radial_ulnar,
            pressure: row.pressure,
            bad_posture_duration: row.dwell_seconds,
            total_time: row.session_time,
        }
    }
}

impl TryFrom<CsvRow> for LogRow {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| crate::Error::Other(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(LogRow {
            timestamp,
            session_time: row.total_time,
            flexion_extension: row.flexion_extension,
            radial_ulnar: row.radial_ulnar,
            pressure: row.pressure,
            dwell_seconds: row.bad_posture_duration,
            // Only Red ticks are ever logged
            zone: Zone::Red,
        })
    }
}

/// Append-only CSV log file
pub struct RowLog {
    path: PathBuf,
}

impl RowLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is empty
    pub fn append(&mut self, row: &LogRow) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        // Checked under the lock so two writers cannot both emit a header
        let needs_headers = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_headers)
            .from_writer(&file);
        writer.serialize(CsvRow::from(row))?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!(
            "Logged row at t={:.2}s (pressure {:.2})",
            row.session_time,
            row.pressure
        );
        Ok(())
    }
}

/// Read every row from a row log
///
/// Returns an empty list if the file doesn't exist. Rows that fail to parse
/// are skipped with a warning.
pub fn read_rows(path: &Path) -> Result<Vec<LogRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(&file);

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        match result {
            Ok(csv_row) => match LogRow::try_from(csv_row) {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!("Failed to parse row {}: {}", index + 1, e),
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize row {}: {}", index + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} rows from {:?}", rows.len(), path);
    Ok(rows)
}
