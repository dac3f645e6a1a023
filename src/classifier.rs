//! Stress classification
//!
//! Combines the emotion and hair sub-scores into a total score and maps the
//! total onto the four-level status. The combined thresholds (4/8/12) differ
//! from the emotion-only thresholds (4/7/10); both sets are kept as-is because
//! downstream consumers read the labels.

use crate::types::{EmotionScore, FrameAssessment, HairScore, StressStatus};

/// Total score at which each status begins
const CEMAS_RINGAN_FROM: u32 = 4;
const CEMAS_SEDANG_FROM: u32 = 8;
const STRES_TINGGI_FROM: u32 = 12;

/// Classifier for the combined stress status
pub struct StressClassifier;

impl StressClassifier {
    /// Combine the two sub-scores into a frame assessment
    pub fn classify(emotion: EmotionScore, hair: HairScore) -> FrameAssessment {
        let total_score = Self::total(emotion.score, hair.score);

        FrameAssessment {
            emotion,
            hair,
            total_score,
            status: Self::status_for(total_score),
        }
    }

    /// Sum of the sub-scores. Not clamped to the nominal maximum.
    pub fn total(emotion_score: u32, hair_score: u32) -> u32 {
        emotion_score.saturating_add(hair_score)
    }

    /// Status for a total score; a boundary value belongs to the higher band
    pub fn status_for(total_score: u32) -> StressStatus {
        if total_score < CEMAS_RINGAN_FROM {
            StressStatus::Tenang
        } else if total_score < CEMAS_SEDANG_FROM {
            StressStatus::CemasRingan
        } else if total_score < STRES_TINGGI_FROM {
            StressStatus::CemasSedang
        } else {
            StressStatus::StresTinggi
        }
    }
}
