//! Durable destinations for session artifacts.

use crate::history::HistoryJournal;
use crate::report::{render_html, render_summary};
use crate::row_log::RowLog;
use crate::{Error, LogRow, ReportRow, Result, SessionRecord, SessionSummary};
use fs2::FileExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const ROW_LOG_FILE: &str = "cts_session.csv";
pub const SUMMARY_FILE: &str = "PostureSessionSummary.txt";
pub const REPORT_FILE: &str = "CTS_Report.html";
pub const HISTORY_FILE: &str = "sessions.jsonl";

/// Session sink trait for persisting session artifacts
pub trait SessionSink {
    fn append_row(&mut self, row: &LogRow) -> Result<()>;
    fn write_summary(&mut self, summary: &SessionSummary) -> Result<()>;
    fn write_report(&mut self, rows: &[ReportRow]) -> Result<()>;
    fn record_session(&mut self, record: &SessionRecord) -> Result<()>;
}

impl<S: SessionSink + ?Sized> SessionSink for &mut S {
    fn append_row(&mut self, row: &LogRow) -> Result<()> {
        (**self).append_row(row)
    }

    fn write_summary(&mut self, summary: &SessionSummary) -> Result<()> {
        (**self).write_summary(summary)
    }

    fn write_report(&mut self, rows: &[ReportRow]) -> Result<()> {
        (**self).write_report(rows)
    }

    fn record_session(&mut self, record: &SessionRecord) -> Result<()> {
        (**self).record_session(record)
    }
}

/// Writes every artifact into one data directory
pub struct FileSink {
    dir: PathBuf,
    row_log: RowLog,
    history: HistoryJournal,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            row_log: RowLog::new(dir.join(ROW_LOG_FILE)),
            history: HistoryJournal::new(dir.join(HISTORY_FILE)),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn row_log_path(&self) -> &Path {
        self.row_log.path()
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    pub fn history_path(&self) -> &Path {
        self.history.path()
    }
}

impl SessionSink for FileSink {
    fn append_row(&mut self, row: &LogRow) -> Result<()> {
        self.row_log
            .append(row)
            .map_err(|e| Error::persistence("row log", e))
    }

    fn write_summary(&mut self, summary: &SessionSummary) -> Result<()> {
        let path = self.summary_path();
        write_atomic(&path, &render_summary(summary))
            .map_err(|e| Error::persistence("summary", e))?;
        tracing::info!("Summary written to {:?}", path);
        Ok(())
    }

    fn write_report(&mut self, rows: &[ReportRow]) -> Result<()> {
        let path = self.report_path();
        write_atomic(&path, &render_html(rows)).map_err(|e| Error::persistence("report", e))?;
        tracing::info!("Report with {} rows written to {:?}", rows.len(), path);
        Ok(())
    }

    fn record_session(&mut self, record: &SessionRecord) -> Result<()> {
        self.history
            .append(record)
            .map_err(|e| Error::persistence("session history", e))
    }
}

/// Replace a file's contents atomically
///
/// Writes to a temp file in the same directory, syncs it, then renames it
/// over the target, so readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "artifact path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;

    // Serialize concurrent writers of the same artifact
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
