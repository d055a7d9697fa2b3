//! Session-level data: settings, candidates and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrainerError;

pub const DEFAULT_DPI: u32 = 800;
pub const MIN_DPI: u32 = 100;
pub const MAX_DPI: u32 = 25_600;
pub const MIN_BASE_SENSITIVITY: f64 = 0.1;
pub const MAX_BASE_SENSITIVITY: f64 = 10.0;

/// Validated user input for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub dpi: u32,
    pub base_sensitivity: f64,
}

impl SessionSettings {
    /// Builds settings from loosely typed values.
    ///
    /// A missing, non-finite or zero DPI falls back to [`DEFAULT_DPI`]; the
    /// result is rounded and clamped. The base sensitivity has no default: it
    /// must be a positive number and is clamped into range.
    pub fn from_loose(dpi: Option<f64>, base_sensitivity: Option<f64>) -> Result<Self, TrainerError> {
        let dpi = sanitize_dpi(dpi);

        let base_sensitivity = match base_sensitivity {
            Some(value) if value.is_finite() && value > 0.0 => {
                value.clamp(MIN_BASE_SENSITIVITY, MAX_BASE_SENSITIVITY)
            }
            Some(value) => {
                return Err(TrainerError::InvalidBaseSensitivity(value.to_string()));
            }
            None => {
                return Err(TrainerError::InvalidBaseSensitivity("missing".to_string()));
            }
        };

        Ok(Self {
            dpi,
            base_sensitivity,
        })
    }

    /// Same as [`SessionSettings::from_loose`] for raw text fields.
    pub fn from_raw(dpi: &str, base_sensitivity: &str) -> Result<Self, TrainerError> {
        let sens = base_sensitivity.trim();
        let parsed_sens = sens
            .parse::<f64>()
            .map_err(|_| TrainerError::InvalidBaseSensitivity(sens.to_string()))?;
        Self::from_loose(dpi.trim().parse::<f64>().ok(), Some(parsed_sens))
    }
}

fn sanitize_dpi(raw: Option<f64>) -> u32 {
    match raw {
        Some(value) if value.is_finite() && value != 0.0 => {
            value.round().clamp(MIN_DPI as f64, MAX_DPI as f64) as u32
        }
        _ => DEFAULT_DPI,
    }
}

/// One sensitivity under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub sensitivity: f64,
    /// Factor relative to the base sensitivity.
    pub multiplier: f64,
    pub label: String,
}

/// Final measurements and score of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub sensitivity: f64,
    pub accuracy_time_ms: f64,
    pub overshoots: u32,
    pub corrections: u32,
    pub path_efficiency: f64,
    pub tracking_score: f64,
    pub tracking_distance: f64,
    /// 0–100
    pub combined_score: u32,
}

/// Suggested change relative to the sensitivity the user started with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Recommendation {
    Increase { from: f64, to: f64 },
    Decrease { from: f64, to: f64 },
    Keep { sensitivity: f64 },
}

/// Handed to the navigation shell once every candidate is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub best_sensitivity: f64,
    pub dpi: u32,
    pub base_sensitivity: f64,
    /// Evaluation order, not score order.
    pub all_results: Vec<CandidateResult>,
    pub recommendation: Recommendation,
    pub completed_at: DateTime<Utc>,
}
