//! Journal of finished sessions.
//!
//! Each finished session is appended as one JSON line with file locking, so
//! several monitors sharing a data directory never interleave writes.

use crate::{Result, SessionRecord};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// JSONL-based session journal with file locking
pub struct HistoryJournal {
    path: PathBuf,
}

impl HistoryJournal {
    /// Create a journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn append(&mut self, record: &SessionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended session {} to history", record.id);
        Ok(())
    }
}

/// Read all sessions from a journal, oldest first
pub fn read_sessions(path: &Path) -> Result<Vec<SessionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut sessions = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SessionRecord>(&line) {
            Ok(session) => sessions.push(session),
            Err(e) => {
                // A torn last line from a crash must not hide earlier sessions
                tracing::warn!("Failed to parse session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from history", sessions.len());
    Ok(sessions)
}

/// The most recent `limit` sessions, newest first
pub fn recent_sessions(path: &Path, limit: usize) -> Result<Vec<SessionRecord>> {
    let mut sessions = read_sessions(path)?;
    sessions.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
    sessions.truncate(limit);
    Ok(sessions)
}
