//! Log reporting
//!
//! Aggregate statistics over the observation log (counts per status, mean
//! total score, latest status, most recent rows) and their JSON encoding with
//! producer metadata.

use crate::error::SenseError;
use crate::types::{Observation, StressStatus};
use crate::{PRODUCER_NAME, SENSE_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default number of recent observations kept in a summary
pub const DEFAULT_RECENT_WINDOW: usize = 20;

/// Aggregate view of the observation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub total_observations: usize,
    /// Count per status; every status is present, zero included
    pub status_counts: BTreeMap<StressStatus, usize>,
    pub mean_total_score: Option<f64>,
    pub latest_status: Option<StressStatus>,
    pub high_stress_count: usize,
    /// Last observations in chronological order
    pub recent: Vec<Observation>,
}

impl LogSummary {
    /// Summarize observations given in log order, keeping the last `recent`
    pub fn from_observations(observations: &[Observation], recent: usize) -> Self {
        let mut status_counts: BTreeMap<StressStatus, usize> =
            StressStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for obs in observations {
            *status_counts.entry(obs.status).or_insert(0) += 1;
        }

        let mean_total_score = if observations.is_empty() {
            None
        } else {
            let sum: u64 = observations.iter().map(|o| u64::from(o.total_skor)).sum();
            Some(sum as f64 / observations.len() as f64)
        };

        let high_stress_count = status_counts
            .get(&StressStatus::StresTinggi)
            .copied()
            .unwrap_or(0);

        let start = observations.len().saturating_sub(recent);

        Self {
            total_observations: observations.len(),
            status_counts,
            mean_total_score,
            latest_status: observations.last().map(|o| o.status),
            high_stress_count,
            recent: observations[start..].to_vec(),
        }
    }

    pub fn count(&self, status: StressStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total_observations == 0
    }
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Summary wrapped with producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub log_path: String,
    pub summary: LogSummary,
}

/// Encoder for summary reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(&self, log_path: &str, summary: LogSummary) -> SummaryReport {
        SummaryReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: SENSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            log_path: log_path.to_string(),
            summary,
        }
    }

    pub fn encode_to_json(&self, log_path: &str, summary: LogSummary) -> Result<String, SenseError> {
        let report = self.encode(log_path, summary);
        serde_json::to_string_pretty(&report).map_err(SenseError::Json)
    }
}
