//! Core domain types for the CTSGuard posture monitor.
//!
//! This module defines the fundamental types used throughout the system:
//! - Wrist angles and reference dataset entries
//! - Severity zones
//! - Session log rows, report rows and summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Angles and Reference Data
// ============================================================================

/// Wrist posture in signed degrees, in engine orientation
///
/// Positive flexion/extension is flexion, negative is extension.
/// Positive radial/ulnar is radial deviation, negative is ulnar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub flexion_extension: f64,
    pub radial_ulnar: f64,
}

impl AngleSample {
    pub fn new(flexion_extension: f64, radial_ulnar: f64) -> Self {
        Self {
            flexion_extension,
            radial_ulnar,
        }
    }

    /// Squared Euclidean distance to another point in angle space
    pub fn distance_sq(&self, flexion_extension: f64, radial_ulnar: f64) -> f64 {
        let dv = flexion_extension - self.flexion_extension;
        let dh = radial_ulnar - self.radial_ulnar;
        dv * dv + dh * dh
    }
}

/// One measured posture and the carpal tunnel pressure observed in it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    pub label: String,
    pub flexion_extension: f64,
    pub radial_ulnar: f64,
    pub pressure_typing: f64,
    pub pressure_static: f64,
}

impl ReferenceEntry {
    /// Pick the pressure column for the current activity
    pub fn pressure(&self, typing: bool) -> f64 {
        if typing {
            self.pressure_typing
        } else {
            self.pressure_static
        }
    }
}

// ============================================================================
// Zones
// ============================================================================

/// Severity zone, ordered by pressure
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    /// Zone for a pressure value under the given thresholds
    pub fn classify(pressure: f64, medium_threshold: f64, high_threshold: f64) -> Zone {
        if pressure >= high_threshold {
            Zone::Red
        } else if pressure >= medium_threshold {
            Zone::Yellow
        } else {
            Zone::Green
        }
    }

    /// Text shown to the wearer for this zone
    pub fn label(&self) -> &'static str {
        match self {
            Zone::Green => "Good posture",
            Zone::Yellow => "Moderate pressure",
            Zone::Red => "High pressure - adjust your wrist",
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, Zone::Red)
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Zone::Green => "Green",
            Zone::Yellow => "Yellow",
            Zone::Red => "Red",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Session Records
// ============================================================================

/// A logged high-pressure tick
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub timestamp: DateTime<Utc>,
    /// Session clock at the time of the tick, in seconds
    pub session_time: f64,
    pub flexion_extension: f64,
    pub radial_ulnar: f64,
    pub pressure: f64,
    pub dwell_seconds: f64,
    pub zone: Zone,
}

/// Report row status
///
/// `Red` means the wearer had been in the Red zone long enough to trigger
/// sustained feedback when the row was logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Yellow,
    Red,
}

impl ReportStatus {
    pub fn from_dwell(dwell_seconds: f64, bad_posture_duration_threshold: f64) -> Self {
        if dwell_seconds >= bad_posture_duration_threshold {
            ReportStatus::Red
        } else {
            ReportStatus::Yellow
        }
    }

    /// CSS class used by the HTML report
    pub fn css_class(&self) -> &'static str {
        match self {
            ReportStatus::Yellow => "yellow",
            ReportStatus::Red => "red",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Yellow => f.write_str("Yellow"),
            ReportStatus::Red => f.write_str("Red"),
        }
    }
}

/// One row of the rendered session report
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub timestamp: DateTime<Utc>,
    pub flexion_extension: f64,
    pub radial_ulnar: f64,
    pub pressure: f64,
    pub duration: f64,
    pub status: ReportStatus,
}

impl ReportRow {
    pub fn from_log_row(row: &LogRow, bad_posture_duration_threshold: f64) -> Self {
        Self {
            timestamp: row.timestamp,
            flexion_extension: row.flexion_extension,
            radial_ulnar: row.radial_ulnar,
            pressure: row.pressure,
            duration: row.dwell_seconds,
            status: ReportStatus::from_dwell(row.dwell_seconds, bad_posture_duration_threshold),
        }
    }
}

/// End-of-session statistics
///
/// Pressure statistics are `None` when no valid pressure was ever observed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_time: f64,
    pub bad_posture_time: f64,
    pub bad_posture_percent: f64,
    pub max_pressure: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub sample_count: u64,
}

/// A finished session, as stored in the history journal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub rows_logged: usize,
    pub summary: SessionSummary,
}
