#![forbid(unsafe_code)]

//! Core domain model and monitoring engine for CTSGuard.
//!
//! This crate provides:
//! - Domain types (angle samples, zones, log rows, session summaries)
//! - Pressure estimation from a reference dataset
//! - Telemetry decoding and device command encoding
//! - The posture classifier with dwell timing and feedback debouncing
//! - Session recording and persistence (CSV row log, summary, HTML report, history)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod dataset;
pub mod estimator;
pub mod telemetry;
pub mod transport;
pub mod classifier;
pub mod row_log;
pub mod history;
pub mod report;
pub mod sink;
pub mod recorder;
pub mod pipeline;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use dataset::{default_dataset, PressureDataset};
pub use estimator::{PressureEstimate, PressureEstimator};
pub use telemetry::{decode_line, DeviceCommand, SensorSample, Telemetry};
pub use transport::{CommandSink, ReaderSource, SourcePoll, TelemetrySource, WriterCommandSink};
pub use classifier::{ClassifierEvent, ClassifierState, PostureClassifier, TickOutcome};
pub use recorder::{PressureStats, SessionEnd, SessionRecorder};
pub use sink::{FileSink, SessionSink};
pub use history::recent_sessions;
pub use pipeline::{FixedStepClock, Monitor, MonitorTick, TickClock, WallClock};
