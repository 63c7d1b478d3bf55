//! Session recording: row log, running pressure statistics, and the
//! end-of-session summary and report.
//!
//! Lifecycle is `open -> on_tick* -> finalize`. Rows are kept in memory as
//! well as streamed to the sink, so a failing sink never loses a row from
//! the final report.

use crate::classifier::{TickOutcome, CLOCK_EPSILON};
use crate::config::RecorderConfig;
use crate::report::report_rows;
use crate::sink::SessionSink;
use crate::{AngleSample, Error, LogRow, Result, SessionRecord, SessionSummary, Zone};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Running max/sum/count over valid pressure readings
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PressureStats {
    max: Option<f64>,
    sum: f64,
    count: u64,
}

impl PressureStats {
    /// Fold one reading; NaN and infinite values are ignored
    pub fn fold(&mut self, pressure: f64) {
        if !pressure.is_finite() {
            return;
        }
        self.max = Some(self.max.map_or(pressure, |m| m.max(pressure)));
        self.sum += pressure;
        self.count += 1;
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn average(&self) -> Result<f64> {
        if self.count == 0 {
            return Err(Error::NoSamples);
        }
        Ok(self.sum / self.count as f64)
    }
}

/// Everything produced when a session closes
#[derive(Debug)]
pub struct SessionEnd {
    pub record: SessionRecord,
    pub rows: Vec<LogRow>,
    /// Artifacts that could not be written; the record above is still valid
    pub errors: Vec<Error>,
}

pub struct SessionRecorder<S> {
    sink: S,
    config: RecorderConfig,
    bad_posture_duration_threshold: f64,
    session_id: Uuid,
    started_at: DateTime<Utc>,
    rows: Vec<LogRow>,
    stats: PressureStats,
    total_time: f64,
    bad_posture_time: f64,
    last_append_at: Option<f64>,
}

impl<S: SessionSink> SessionRecorder<S> {
    /// Open a recorder for a new session
    pub fn open(
        sink: S,
        config: RecorderConfig,
        bad_posture_duration_threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        tracing::info!("Opened session {}", session_id);
        Self {
            sink,
            config,
            bad_posture_duration_threshold,
            session_id,
            started_at: now,
            rows: Vec::new(),
            stats: PressureStats::default(),
            total_time: 0.0,
            bad_posture_time: 0.0,
            last_append_at: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    pub fn stats(&self) -> &PressureStats {
        &self.stats
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Count session time for a tick that had no sample to classify
    pub fn advance_clock(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.total_time += dt;
        }
    }

    /// Fold one classified tick into the session
    ///
    /// Returns whether a row was logged. An `Err` means the row could not be
    /// written to the sink; it is still kept in memory.
    pub fn on_tick(
        &mut self,
        sample: AngleSample,
        pressure: f64,
        outcome: &TickOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.total_time += outcome.dt;

        if !outcome.pressure_valid || !pressure.is_finite() {
            return Ok(false);
        }

        self.stats.fold(pressure);

        if outcome.zone != Zone::Red {
            return Ok(false);
        }
        self.bad_posture_time += outcome.dt;

        if !self.log_due() {
            return Ok(false);
        }

        let row = LogRow {
            timestamp: now,
            session_time: self.total_time,
            flexion_extension: sample.flexion_extension,
            radial_ulnar: sample.radial_ulnar,
            pressure,
            dwell_seconds: outcome.dwell_seconds,
            zone: outcome.zone,
        };
        self.last_append_at = Some(self.total_time);

        let written = self.sink.append_row(&row);
        self.rows.push(row);
        written?;
        Ok(true)
    }

    fn log_due(&self) -> bool {
        match self.last_append_at {
            Some(at) => self.total_time - at >= self.config.report_log_interval - CLOCK_EPSILON,
            None => true,
        }
    }

    /// Statistics for the session so far
    pub fn summary(&self) -> SessionSummary {
        let bad_posture_percent = if self.total_time > 0.0 {
            self.bad_posture_time / self.total_time * 100.0
        } else {
            0.0
        };

        SessionSummary {
            total_time: self.total_time,
            bad_posture_time: self.bad_posture_time,
            bad_posture_percent,
            max_pressure: self.stats.max(),
            avg_pressure: self.stats.average().ok(),
            sample_count: self.stats.count(),
        }
    }

    /// Close the session and persist summary, report and history entry
    ///
    /// Every artifact is attempted even if an earlier one fails.
    pub fn finalize(mut self, now: DateTime<Utc>) -> SessionEnd {
        if let Err(e) = self.stats.average() {
            tracing::warn!("Session {}: {}", self.session_id, e);
        }

        let summary = self.summary();
        let record = SessionRecord {
            id: self.session_id,
            started_at: self.started_at,
            ended_at: now,
            rows_logged: self.rows.len(),
            summary,
        };

        let mut errors = Vec::new();

        if let Err(e) = self.sink.write_summary(&record.summary) {
            tracing::warn!("Failed to write summary: {}", e);
            errors.push(e);
        }

        let report = report_rows(&self.rows, self.bad_posture_duration_threshold);
        if let Err(e) = self.sink.write_report(&report) {
            tracing::warn!("Failed to write report: {}", e);
            errors.push(e);
        }

        if let Err(e) = self.sink.record_session(&record) {
            tracing::warn!("Failed to record session history: {}", e);
            errors.push(e);
        }

        tracing::info!(
            "Closed session {}: {:.1}s total, {:.1}s bad posture ({:.1}%), {} rows",
            record.id,
            record.summary.total_time,
            record.summary.bad_posture_time,
            record.summary.bad_posture_percent,
            record.rows_logged
        );

        SessionEnd {
            record,
            rows: self.rows,
            errors,
        }
    }
}
