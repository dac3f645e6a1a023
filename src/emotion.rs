//! Emotion scoring
//!
//! This module turns the upstream analyzer's emotion distribution into the
//! anxiety sub-score:
//! - `EmotionSource` is the boundary to the external face-emotion classifier
//! - `EmotionReading` makes "no face" an explicit variant instead of an error
//! - `EmotionScorer` applies the weighted, per-term truncated formula

use crate::error::DetectionError;
use crate::types::{EmotionDistribution, EmotionLabel, EmotionReading, EmotionScore, MAX_PERCENT};
use image::RgbImage;
use std::collections::VecDeque;
use tracing::debug;

/// Weight applied to the fear percentage
const FEAR_WEIGHT: f64 = 0.3;
/// Weight applied to the angry percentage
const ANGRY_WEIGHT: f64 = 0.3;
/// Weight applied to the sad percentage
const SAD_WEIGHT: f64 = 0.2;
/// Weight applied to the disgust percentage
const DISGUST_WEIGHT: f64 = 0.2;

/// Upstream face-emotion analyzer
pub trait EmotionSource {
    /// Analyze a frame and return the emotion distribution of the dominant face
    fn analyze(&mut self, frame: &RgbImage) -> Result<EmotionDistribution, DetectionError>;
}

impl<F> EmotionSource for F
where
    F: FnMut(&RgbImage) -> Result<EmotionDistribution, DetectionError>,
{
    fn analyze(&mut self, frame: &RgbImage) -> Result<EmotionDistribution, DetectionError> {
        self(frame)
    }
}

/// Source that replays pre-computed analyzer results in order.
///
/// Once the queue is drained every frame reads as "no face".
#[derive(Debug, Default)]
pub struct ReplaySource {
    queue: VecDeque<Result<EmotionDistribution, DetectionError>>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for the next analyzed frame
    pub fn push(&mut self, result: Result<EmotionDistribution, DetectionError>) {
        self.queue.push_back(result);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl EmotionSource for ReplaySource {
    fn analyze(&mut self, _frame: &RgbImage) -> Result<EmotionDistribution, DetectionError> {
        self.queue.pop_front().unwrap_or(Err(DetectionError::NoFace))
    }
}

impl EmotionReading {
    /// Run the source on a frame, folding every failure into `NotDetected`
    pub fn from_source<S: EmotionSource + ?Sized>(source: &mut S, frame: &RgbImage) -> Self {
        match source.analyze(frame) {
            Ok(distribution) => Self::from_distribution(distribution),
            Err(e) => {
                debug!(error = %e, "emotion analysis failed, treating face as not detected");
                EmotionReading::NotDetected
            }
        }
    }

    /// Wrap a distribution, rejecting values the scorer cannot use
    pub fn from_distribution(distribution: EmotionDistribution) -> Self {
        match distribution.validate() {
            Ok(()) => EmotionReading::Detected(distribution),
            Err(e) => {
                debug!(error = %e, "discarding invalid emotion distribution");
                EmotionReading::NotDetected
            }
        }
    }
}

impl EmotionDistribution {
    /// Parse analyzer output.
    ///
    /// Accepts a flat object (`{"fear": 12.5, ...}`) or the analyzer's
    /// per-face list (`[{"emotion": {...}}, ...]`), in which case the first
    /// face is used.
    pub fn from_json(json: &str) -> Result<Self, DetectionError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| DetectionError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, DetectionError> {
        let face = match value {
            serde_json::Value::Array(mut faces) => {
                if faces.is_empty() {
                    return Err(DetectionError::NoFace);
                }
                faces.swap_remove(0)
            }
            other => other,
        };

        let emotions = match face {
            serde_json::Value::Object(mut map) => match map.remove("emotion") {
                Some(inner) => inner,
                None => serde_json::Value::Object(map),
            },
            serde_json::Value::Null => return Err(DetectionError::NoFace),
            other => {
                return Err(DetectionError::Malformed(format!(
                    "expected an object, got {other}"
                )))
            }
        };

        let map = emotions
            .as_object()
            .ok_or_else(|| DetectionError::Malformed("emotion field is not an object".to_string()))?;
        for key in ["fear", "angry", "sad", "disgust"] {
            if !map.contains_key(key) {
                return Err(DetectionError::MissingEmotion(key.to_string()));
            }
        }

        let distribution: EmotionDistribution = serde_json::from_value(emotions)
            .map_err(|e| DetectionError::Malformed(e.to_string()))?;
        distribution.validate()?;
        Ok(distribution)
    }
}

/// Scorer for the emotion sub-score
pub struct EmotionScorer;

impl EmotionScorer {
    /// Score a reading; an undetected face scores 0 with its own label
    pub fn score(reading: &EmotionReading) -> EmotionScore {
        match reading {
            EmotionReading::Detected(distribution) if distribution.validate().is_ok() => {
                let score = Self::anxiety_score(distribution);
                EmotionScore {
                    score,
                    label: Self::label_for(score),
                }
            }
            _ => EmotionScore {
                score: 0,
                label: EmotionLabel::WajahTidakTerdeteksi,
            },
        }
    }

    /// Analyze a frame with `source` and score the result
    pub fn score_frame<S: EmotionSource + ?Sized>(source: &mut S, frame: &RgbImage) -> EmotionScore {
        Self::score(&EmotionReading::from_source(source, frame))
    }

    /// Weighted sum of the scored emotions, each term truncated before summing
    pub fn anxiety_score(distribution: &EmotionDistribution) -> u32 {
        weighted_term(distribution.fear, FEAR_WEIGHT)
            + weighted_term(distribution.angry, ANGRY_WEIGHT)
            + weighted_term(distribution.sad, SAD_WEIGHT)
            + weighted_term(distribution.disgust, DISGUST_WEIGHT)
    }

    /// Emotion-only label thresholds (4/7/10)
    pub fn label_for(score: u32) -> EmotionLabel {
        if score < 4 {
            EmotionLabel::Tenang
        } else if score < 7 {
            EmotionLabel::CemasRingan
        } else if score < 10 {
            EmotionLabel::CemasSedang
        } else {
            EmotionLabel::StresTinggi
        }
    }
}

/// `value * weight` truncated toward zero, capped at the term for 100%
fn weighted_term(value: f64, weight: f64) -> u32 {
    let cap = (MAX_PERCENT * weight).trunc();
    (value * weight).trunc().clamp(0.0, cap) as u32
}
