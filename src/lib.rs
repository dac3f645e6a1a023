//! Stress Sense - Frame-level stress classification
//!
//! Stress Sense turns per-frame measurements into a bounded stress score
//! through a deterministic pipeline: emotion scoring + hair disorder scoring
//! → stress classification → sampled observation log.
//!
//! ## Modules
//!
//! - **Scoring**: `emotion`, `hair` and `classifier` are pure functions over a frame
//!   and the upstream emotion reading
//! - **Persistence**: `observation_log` appends sampled observations to a CSV log;
//!   `report` aggregates it

pub mod classifier;
pub mod config;
pub mod emotion;
pub mod error;
pub mod hair;
pub mod logging;
pub mod observation_log;
pub mod pipeline;
pub mod report;
pub mod types;

pub use classifier::StressClassifier;
pub use config::SenseConfig;
pub use emotion::{EmotionScorer, EmotionSource, ReplaySource};
pub use error::{DetectionError, SenseError};
pub use hair::HairDisorderScorer;
pub use observation_log::ObservationLog;
pub use pipeline::{assess_frame, LogOutcome, ProcessedFrame, StressProcessor};
pub use report::{LogSummary, ReportEncoder};
pub use types::{
    EmotionDistribution, EmotionLabel, EmotionReading, FrameAssessment, HairLabel, Observation,
    StressStatus,
};

/// Crate version embedded in reports
pub const SENSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "stress-sense";
