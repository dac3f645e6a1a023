//! Pipeline orchestration
//!
//! This module provides the public API for Stress Sense. It runs one frame
//! through the full pipeline and persists a sampled subset of the results.

use crate::classifier::StressClassifier;
use crate::config::{FrameConfig, SenseConfig};
use crate::emotion::{EmotionScorer, EmotionSource};
use crate::error::SenseError;
use crate::hair::HairDisorderScorer;
use crate::observation_log::ObservationLog;
use crate::types::{EmotionReading, FrameAssessment, Observation};
use chrono::{Local, NaiveDateTime};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::borrow::Cow;
use tracing::warn;

/// Score a single frame (stateless, nothing persisted).
///
/// Pipeline stages:
/// 1. EmotionScorer - emotion sub-score from the upstream reading
/// 2. HairDisorderScorer - hair sub-score from the frame
/// 3. StressClassifier - total score and status
///
/// # Example
/// ```ignore
/// let assessment = assess_frame(&frame, &EmotionReading::NotDetected);
/// ```
pub fn assess_frame(frame: &RgbImage, reading: &EmotionReading) -> FrameAssessment {
    let emotion = EmotionScorer::score(reading);
    let hair = HairDisorderScorer::score(frame);
    StressClassifier::classify(emotion, hair)
}

/// What happened to the observation log for a processed frame
#[derive(Debug)]
pub enum LogOutcome {
    /// Frame was not a sampling point, or no log is attached
    Skipped,
    Appended(Observation),
    /// The append failed; the assessment is still valid
    Failed(SenseError),
}

/// Result of processing one frame
#[derive(Debug)]
pub struct ProcessedFrame {
    /// 1-based index of the frame within this processor
    pub frame_index: u64,
    pub assessment: FrameAssessment,
    pub log: LogOutcome,
}

/// Stateful processor for a capture loop.
///
/// Owns the emotion source and the optional observation log. Frames are
/// scored synchronously; every `sample_every`-th frame is appended to the log.
pub struct StressProcessor<S: EmotionSource> {
    source: S,
    log: Option<ObservationLog>,
    sample_every: u64,
    frame: FrameConfig,
    frames_processed: u64,
}

impl<S: EmotionSource> StressProcessor<S> {
    /// Create a processor with default settings and no log attached
    pub fn new(source: S) -> Self {
        let defaults = SenseConfig::default();
        Self {
            source,
            log: None,
            sample_every: defaults.sample_every,
            frame: defaults.frame,
            frames_processed: 0,
        }
    }

    /// Create a processor logging to `config.log_path`
    pub fn with_config(source: S, config: &SenseConfig) -> Result<Self, SenseError> {
        config.validate()?;
        Ok(Self {
            source,
            log: Some(ObservationLog::new(config.log_path.clone())),
            sample_every: config.sample_every,
            frame: config.frame.clone(),
            frames_processed: 0,
        })
    }

    /// Attach (or replace) the observation log
    pub fn with_log(mut self, log: ObservationLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Detach the observation log; frames are still scored
    pub fn without_log(mut self) -> Self {
        self.log = None;
        self
    }

    pub fn log(&self) -> Option<&ObservationLog> {
        self.log.as_ref()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Process a frame, timestamping any persisted observation with the
    /// local wall clock
    pub fn process_frame(&mut self, frame: &RgbImage) -> ProcessedFrame {
        self.process_frame_at(frame, Local::now().naive_local())
    }

    /// Process a frame with an explicit observation timestamp
    pub fn process_frame_at(&mut self, frame: &RgbImage, timestamp: NaiveDateTime) -> ProcessedFrame {
        self.frames_processed += 1;
        let frame_index = self.frames_processed;

        let frame = self.normalize(frame);
        let reading = EmotionReading::from_source(&mut self.source, &frame);
        let assessment = assess_frame(&frame, &reading);

        let log = if frame_index % self.sample_every == 0 {
            self.persist(&assessment, timestamp)
        } else {
            LogOutcome::Skipped
        };

        ProcessedFrame {
            frame_index,
            assessment,
            log,
        }
    }

    fn normalize<'a>(&self, frame: &'a RgbImage) -> Cow<'a, RgbImage> {
        let target = (self.frame.width, self.frame.height);
        if !self.frame.resize
            || frame.width() == 0
            || frame.height() == 0
            || frame.dimensions() == target
        {
            return Cow::Borrowed(frame);
        }
        Cow::Owned(imageops::resize(frame, target.0, target.1, FilterType::Triangle))
    }

    fn persist(&self, assessment: &FrameAssessment, timestamp: NaiveDateTime) -> LogOutcome {
        let Some(log) = &self.log else {
            return LogOutcome::Skipped;
        };

        let observation = Observation::record(timestamp, assessment);
        match log.append(&observation) {
            Ok(()) => LogOutcome::Appended(observation),
            Err(e) => {
                warn!(path = %log.path().display(), error = %e, "failed to persist observation");
                LogOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::ReplaySource;
    use crate::error::DetectionError;
    use crate::types::{EmotionDistribution, EmotionLabel, HairLabel, StressStatus};
    use chrono::NaiveDate;
    use image::Rgb;
    use tempfile::tempdir;

    fn calm_frame() -> RgbImage {
        RgbImage::from_pixel(640, 480, Rgb([200, 180, 160]))
    }

    fn anxious() -> EmotionDistribution {
        EmotionDistribution {
            fear: 20.0,
            angry: 10.0,
            sad: 5.0,
            disgust: 5.0,
            happy: 0.0,
            neutral: 60.0,
            surprise: 0.0,
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let assessment = assess_frame(&calm_frame(), &EmotionReading::Detected(anxious()));

        assert_eq!(assessment.emotion.score, 11);
        assert_eq!(assessment.emotion.label, EmotionLabel::StresTinggi);
        assert_eq!(assessment.hair.score, 0);
        assert_eq!(assessment.hair.label, HairLabel::RambutRapih);
        assert_eq!(assessment.total_score, 11);
        assert_eq!(assessment.status, StressStatus::CemasSedang);
    }

    #[test]
    fn test_undetected_face_still_scores() {
        let assessment = assess_frame(&calm_frame(), &EmotionReading::NotDetected);

        assert_eq!(assessment.emotion.label, EmotionLabel::WajahTidakTerdeteksi);
        assert_eq!(assessment.total_score, 0);
        assert_eq!(assessment.status, StressStatus::Tenang);
    }

    #[test]
    fn test_out_of_range_emotions_keep_total_consistent() {
        let textured = RgbImage::from_fn(640, 480, |x, _| {
            if (x / 4) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let huge = EmotionDistribution {
            fear: 1e300,
            angry: 1e300,
            sad: 1e300,
            disgust: 1e300,
            ..Default::default()
        };

        let assessment = assess_frame(&textured, &EmotionReading::from_distribution(huge));
        assert_eq!(assessment.emotion.label, EmotionLabel::WajahTidakTerdeteksi);
        assert_eq!(
            assessment.total_score,
            assessment.emotion.score + assessment.hair.score
        );

        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("results.csv"));
        log.append(&Observation::record(noon(), &assessment)).unwrap();
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_sampling_cadence() {
        let dir = tempdir().unwrap();
        let config = SenseConfig {
            log_path: dir.path().join("results.csv"),
            sample_every: 3,
            ..Default::default()
        };
        let mut processor = StressProcessor::with_config(ReplaySource::new(), &config).unwrap();

        let frame = calm_frame();
        let mut appended = Vec::new();
        for _ in 0..7 {
            let processed = processor.process_frame_at(&frame, noon());
            if let LogOutcome::Appended(obs) = processed.log {
                appended.push((processed.frame_index, obs));
            }
        }

        assert_eq!(processor.frames_processed(), 7);
        assert_eq!(
            appended.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![3, 6]
        );

        let stored = processor.log().unwrap().read_all().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], appended[0].1);
    }

    #[test]
    fn test_source_results_flow_into_log() {
        let dir = tempdir().unwrap();
        let config = SenseConfig {
            log_path: dir.path().join("results.csv"),
            sample_every: 1,
            ..Default::default()
        };
        let mut processor = StressProcessor::with_config(ReplaySource::new(), &config).unwrap();
        processor.source_mut().push(Ok(anxious()));
        processor
            .source_mut()
            .push(Err(DetectionError::Detector("timeout".to_string())));

        let frame = calm_frame();
        let first = processor.process_frame_at(&frame, noon());
        let second = processor.process_frame_at(&frame, noon());

        assert_eq!(first.assessment.status, StressStatus::CemasSedang);
        assert_eq!(
            second.assessment.emotion.label,
            EmotionLabel::WajahTidakTerdeteksi
        );

        let stored = processor.log().unwrap().read_all().unwrap();
        assert_eq!(stored[0].skor_ekspresi, 11);
        assert_eq!(stored[0].total_skor, 11);
        assert_eq!(stored[1].ekspresi, EmotionLabel::WajahTidakTerdeteksi);
    }

    #[test]
    fn test_log_failure_does_not_hide_assessment() {
        let dir = tempdir().unwrap();
        // A directory where the log file should be makes every append fail
        let blocked = dir.path().join("results.csv");
        std::fs::create_dir(&blocked).unwrap();

        let mut processor =
            StressProcessor::new(ReplaySource::new()).with_log(ObservationLog::new(&blocked));
        processor.sample_every = 1;
        processor.source_mut().push(Ok(anxious()));

        let processed = processor.process_frame_at(&calm_frame(), noon());

        assert!(matches!(processed.log, LogOutcome::Failed(_)));
        assert_eq!(processed.assessment.total_score, 11);
    }

    #[test]
    fn test_no_log_attached_skips() {
        let dir = tempdir().unwrap();
        let config = SenseConfig {
            log_path: dir.path().join("results.csv"),
            sample_every: 1,
            ..Default::default()
        };
        let mut processor = StressProcessor::with_config(ReplaySource::new(), &config)
            .unwrap()
            .without_log();

        let processed = processor.process_frame_at(&calm_frame(), noon());
        assert!(matches!(processed.log, LogOutcome::Skipped));
        assert!(!config.log_path.exists());
    }

    #[test]
    fn test_frames_resized_before_scoring() {
        let mut seen = Vec::new();
        let source = |frame: &RgbImage| -> Result<EmotionDistribution, DetectionError> {
            seen.push(frame.dimensions());
            Err(DetectionError::NoFace)
        };
        let mut processor = StressProcessor::new(source);

        processor.process_frame_at(&RgbImage::new(1280, 720), noon());
        processor.process_frame_at(&RgbImage::new(640, 480), noon());
        drop(processor);

        assert_eq!(seen, vec![(640, 480), (640, 480)]);
    }

    #[test]
    fn test_empty_frame_does_not_panic() {
        let mut processor = StressProcessor::new(ReplaySource::new());
        let processed = processor.process_frame_at(&RgbImage::new(0, 0), noon());
        assert_eq!(processed.assessment.status, StressStatus::Tenang);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SenseConfig {
            sample_every: 0,
            ..Default::default()
        };
        assert!(StressProcessor::with_config(ReplaySource::new(), &config).is_err());
    }
}
