//! Error types for the ctsguard_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ctsguard_core operations
///
/// None of these stop the monitoring loop. Telemetry, dataset and sample
/// conditions are reported and skipped; persistence errors are surfaced to the
/// caller while the in-memory session keeps running.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reference dataset entry could not be used
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Telemetry line that is neither a sample nor a calibration ack
    #[error("Malformed telemetry: {0:?}")]
    MalformedTelemetry(String),

    /// The reference dataset has no entries to match against
    #[error("Reference dataset is empty")]
    DatasetEmpty,

    /// A statistic was requested over zero valid pressure readings
    #[error("No valid pressure samples recorded")]
    NoSamples,

    /// The device channel could not deliver data
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Session log, summary or report could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap any error raised while writing session artifacts
    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Persistence(format!("{}: {}", context, err))
    }
}
