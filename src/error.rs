//! Error types for Stress Sense

use thiserror::Error;

/// Errors surfaced by the observation log, configuration and frame I/O.
///
/// Scoring never returns these; see [`DetectionError`] for the upstream
/// emotion failures that the scorer folds into its fallback label.
#[derive(Debug, Error)]
pub enum SenseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Log schema mismatch: expected [{expected}], found [{found}]")]
    SchemaMismatch { expected: String, found: String },

    #[error("Corrupt record at row {row}: {reason}")]
    CorruptRecord { row: usize, reason: String },

    #[error("Invalid observation: {0}")]
    InvalidObservation(String),
}

/// Failure reported by (or while interpreting) the upstream emotion analyzer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("No face detected")]
    NoFace,

    #[error("Missing emotion in distribution: {0}")]
    MissingEmotion(String),

    #[error("Invalid value for {emotion}: {value}")]
    InvalidValue { emotion: String, value: f64 },

    #[error("Malformed distribution: {0}")]
    Malformed(String),

    #[error("Detector failure: {0}")]
    Detector(String),
}
