//! Core types for the Stress Sense pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: the upstream emotion distribution, the two sub-scores, the combined
//! frame assessment, and the observation persisted to the log.

use crate::classifier::StressClassifier;
use crate::error::DetectionError;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp format of the `waktu` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Upper bound of an emotion percentage
pub const MAX_PERCENT: f64 = 100.0;

/// Emotion vocabulary produced by the upstream analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Fear,
    Angry,
    Sad,
    Disgust,
    Happy,
    Neutral,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Fear,
        Emotion::Angry,
        Emotion::Sad,
        Emotion::Disgust,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Fear => "fear",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Disgust => "disgust",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Surprise => "surprise",
        }
    }

    /// Whether the emotion contributes to the anxiety sub-score
    pub fn is_scored(&self) -> bool {
        matches!(
            self,
            Emotion::Fear | Emotion::Angry | Emotion::Sad | Emotion::Disgust
        )
    }
}

/// Per-frame emotion percentages (0-100) from the upstream analyzer.
///
/// Values need not sum to exactly 100. Only fear, angry, sad and disgust are
/// scored, so only those are required when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionDistribution {
    pub fear: f64,
    pub angry: f64,
    pub sad: f64,
    pub disgust: f64,
    #[serde(default)]
    pub happy: f64,
    #[serde(default)]
    pub neutral: f64,
    #[serde(default)]
    pub surprise: f64,
}

impl Default for EmotionDistribution {
    fn default() -> Self {
        Self {
            fear: 0.0,
            angry: 0.0,
            sad: 0.0,
            disgust: 0.0,
            happy: 0.0,
            neutral: 0.0,
            surprise: 0.0,
        }
    }
}

impl EmotionDistribution {
    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Fear => self.fear,
            Emotion::Angry => self.angry,
            Emotion::Sad => self.sad,
            Emotion::Disgust => self.disgust,
            Emotion::Happy => self.happy,
            Emotion::Neutral => self.neutral,
            Emotion::Surprise => self.surprise,
        }
    }

    /// Reject scored values outside 0-100 or not finite
    pub fn validate(&self) -> Result<(), DetectionError> {
        for emotion in Emotion::ALL.iter().filter(|e| e.is_scored()) {
            let value = self.get(*emotion);
            if !(0.0..=MAX_PERCENT).contains(&value) {
                return Err(DetectionError::InvalidValue {
                    emotion: emotion.as_str().to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Outcome of upstream emotion analysis for one frame
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionReading {
    Detected(EmotionDistribution),
    NotDetected,
}

/// Label attached to the emotion sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionLabel {
    #[serde(rename = "Tenang")]
    Tenang,
    #[serde(rename = "Cemas Ringan")]
    CemasRingan,
    #[serde(rename = "Cemas Sedang")]
    CemasSedang,
    #[serde(rename = "Stres Tinggi")]
    StresTinggi,
    #[serde(rename = "Wajah Tidak Terdeteksi")]
    WajahTidakTerdeteksi,
}

impl EmotionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Tenang => "Tenang",
            EmotionLabel::CemasRingan => "Cemas Ringan",
            EmotionLabel::CemasSedang => "Cemas Sedang",
            EmotionLabel::StresTinggi => "Stres Tinggi",
            EmotionLabel::WajahTidakTerdeteksi => "Wajah Tidak Terdeteksi",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label attached to the hair sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HairLabel {
    #[serde(rename = "Rambut Rapih")]
    RambutRapih,
    #[serde(rename = "Rambut Agak Acak")]
    RambutAgakAcak,
    #[serde(rename = "Rambut Sangat Acak")]
    RambutSangatAcak,
}

impl HairLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HairLabel::RambutRapih => "Rambut Rapih",
            HairLabel::RambutAgakAcak => "Rambut Agak Acak",
            HairLabel::RambutSangatAcak => "Rambut Sangat Acak",
        }
    }
}

impl fmt::Display for HairLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined stress status. Variants are ordered from calm to high stress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StressStatus {
    #[serde(rename = "Tenang")]
    Tenang,
    #[serde(rename = "Cemas Ringan")]
    CemasRingan,
    #[serde(rename = "Cemas Sedang")]
    CemasSedang,
    #[serde(rename = "Stres Tinggi")]
    StresTinggi,
}

impl StressStatus {
    pub const ALL: [StressStatus; 4] = [
        StressStatus::Tenang,
        StressStatus::CemasRingan,
        StressStatus::CemasSedang,
        StressStatus::StresTinggi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StressStatus::Tenang => "Tenang",
            StressStatus::CemasRingan => "Cemas Ringan",
            StressStatus::CemasSedang => "Cemas Sedang",
            StressStatus::StresTinggi => "Stres Tinggi",
        }
    }

    /// Inclusive total-score range of the status; the top band is open-ended
    pub fn score_range(&self) -> (u32, Option<u32>) {
        match self {
            StressStatus::Tenang => (0, Some(3)),
            StressStatus::CemasRingan => (4, Some(7)),
            StressStatus::CemasSedang => (8, Some(11)),
            StressStatus::StresTinggi => (12, None),
        }
    }

    /// Interpretation shown next to the status
    pub fn guidance(&self) -> &'static str {
        match self {
            StressStatus::Tenang => "Kondisi mental stabil",
            StressStatus::CemasRingan => "Mulai ada tanda kecemasan",
            StressStatus::CemasSedang => "Perlu perhatian lebih",
            StressStatus::StresTinggi => "Disarankan konsultasi profesional",
        }
    }
}

impl fmt::Display for StressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StressStatus::ALL
            .iter()
            .find(|status| status.as_str() == s.trim())
            .copied()
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}

/// Emotion sub-score and its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub score: u32,
    pub label: EmotionLabel,
}

/// Hair disorder sub-score, its label and the measured edge density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HairScore {
    pub score: u32,
    pub label: HairLabel,
    /// Fraction of edge pixels in the region of interest (0-1)
    pub edge_density: f64,
}

/// Fully scored frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameAssessment {
    pub emotion: EmotionScore,
    pub hair: HairScore,
    pub total_score: u32,
    pub status: StressStatus,
}

/// One row of the observation log.
///
/// Field names and order are the persisted column schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(with = "waktu_format")]
    pub waktu: NaiveDateTime,
    pub ekspresi: EmotionLabel,
    pub skor_ekspresi: u32,
    pub rambut: HairLabel,
    pub skor_rambut: u32,
    pub total_skor: u32,
    pub status: StressStatus,
}

impl Observation {
    /// Build an observation from a frame assessment, truncating the
    /// timestamp to whole seconds
    pub fn record(timestamp: NaiveDateTime, assessment: &FrameAssessment) -> Self {
        let waktu = timestamp.with_nanosecond(0).unwrap_or(timestamp);
        Self {
            waktu,
            ekspresi: assessment.emotion.label,
            skor_ekspresi: assessment.emotion.score,
            rambut: assessment.hair.label,
            skor_rambut: assessment.hair.score,
            total_skor: assessment.total_score,
            status: assessment.status,
        }
    }

    /// Check that the total is the sum of the sub-scores and the status
    /// matches the total
    pub fn is_consistent(&self) -> bool {
        self.skor_ekspresi.checked_add(self.skor_rambut) == Some(self.total_skor)
            && StressClassifier::status_for(self.total_skor) == self.status
    }
}

mod waktu_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_assessment() -> FrameAssessment {
        FrameAssessment {
            emotion: EmotionScore {
                score: 6,
                label: EmotionLabel::CemasRingan,
            },
            hair: HairScore {
                score: 2,
                label: HairLabel::RambutAgakAcak,
                edge_density: 0.031,
            },
            total_score: 8,
            status: StressStatus::CemasSedang,
        }
    }

    #[test]
    fn test_labels_serialize_verbatim() {
        assert_eq!(
            serde_json::to_string(&StressStatus::StresTinggi).unwrap(),
            "\"Stres Tinggi\""
        );
        assert_eq!(
            serde_json::to_string(&EmotionLabel::WajahTidakTerdeteksi).unwrap(),
            "\"Wajah Tidak Terdeteksi\""
        );
        assert_eq!(
            serde_json::to_string(&HairLabel::RambutAgakAcak).unwrap(),
            "\"Rambut Agak Acak\""
        );
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Cemas Ringan".parse::<StressStatus>(), Ok(StressStatus::CemasRingan));
        assert!("Panik".parse::<StressStatus>().is_err());
    }

    #[test]
    fn test_distribution_requires_scored_emotions() {
        let parsed: Result<EmotionDistribution, _> =
            serde_json::from_str(r#"{"fear": 1.0, "angry": 2.0, "sad": 3.0}"#);
        assert!(parsed.is_err());

        let parsed: EmotionDistribution = serde_json::from_str(
            r#"{"fear": 1.0, "angry": 2.0, "sad": 3.0, "disgust": 4.0}"#,
        )
        .unwrap();
        assert_eq!(parsed.happy, 0.0);
        assert_eq!(parsed.get(Emotion::Disgust), 4.0);
    }

    #[test]
    fn test_distribution_validate_rejects_negative() {
        let dist = EmotionDistribution {
            sad: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            dist.validate(),
            Err(DetectionError::InvalidValue { .. })
        ));
        assert!(EmotionDistribution::default().validate().is_ok());
    }

    #[test]
    fn test_distribution_validate_rejects_above_hundred() {
        let dist = EmotionDistribution {
            fear: 100.5,
            ..Default::default()
        };
        assert!(matches!(
            dist.validate(),
            Err(DetectionError::InvalidValue { ref emotion, .. }) if emotion == "fear"
        ));

        let full = EmotionDistribution {
            fear: 100.0,
            angry: 100.0,
            sad: 100.0,
            disgust: 100.0,
            ..Default::default()
        };
        assert!(full.validate().is_ok());
    }

    #[test]
    fn test_observation_record_truncates_to_seconds() {
        let ts = NaiveDate::from_ymd_opt(2025, 7, 14)
            .unwrap()
            .and_hms_milli_opt(10, 30, 5, 750)
            .unwrap();
        let obs = Observation::record(ts, &sample_assessment());

        assert_eq!(obs.waktu.format(TIMESTAMP_FORMAT).to_string(), "2025-07-14 10:30:05");
        assert_eq!(obs.total_skor, 8);
        assert!(obs.is_consistent());
    }

    #[test]
    fn test_observation_inconsistency_detected() {
        let ts = NaiveDate::from_ymd_opt(2025, 7, 14)
            .unwrap()
            .and_hms_opt(10, 30, 5)
            .unwrap();
        let mut obs = Observation::record(ts, &sample_assessment());
        obs.status = StressStatus::Tenang;
        assert!(!obs.is_consistent());
    }
}
