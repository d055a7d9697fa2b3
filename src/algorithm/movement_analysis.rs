//! Movement-quality analysis of captured cursor paths.
//!
//! A *correction* is a reversal of intent: a step whose direction differs from
//! the previous step by more than 90° while being longer than the jitter
//! threshold. An *overshoot* is a correction large enough to mean the cursor
//! flew past the target.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::Serialize;

use crate::models::analytics::{AccuracyHit, AccuracyResult, MovementSample, TrackingResult};

/// Steps at or below this length never count as a correction.
pub const JITTER_THRESHOLD: f64 = 3.0;
/// Correction steps above this length also count as an overshoot.
pub const OVERSHOOT_THRESHOLD: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementAnalysis {
    pub overshoots: u32,
    pub corrections: u32,
    pub total_distance: f64,
    /// 0.0–100.0
    pub path_efficiency: f64,
}

impl Default for MovementAnalysis {
    fn default() -> Self {
        Self {
            overshoots: 0,
            corrections: 0,
            total_distance: 0.0,
            path_efficiency: 100.0,
        }
    }
}

pub fn analyze_movement(samples: &[MovementSample]) -> MovementAnalysis {
    if samples.len() < 2 {
        return MovementAnalysis::default();
    }

    let mut overshoots = 0u32;
    let mut corrections = 0u32;
    let mut total_distance = 0.0;
    let mut last_direction: Option<f64> = None;

    for pair in samples.windows(2) {
        let dx = pair[1].x - pair[0].x;
        let dy = pair[1].y - pair[0].y;
        let distance = dx.hypot(dy);
        total_distance += distance;

        let direction = dy.atan2(dx);
        if let Some(last) = last_direction {
            if distance > JITTER_THRESHOLD && angle_between(direction, last) > FRAC_PI_2 {
                corrections += 1;
                if distance > OVERSHOOT_THRESHOLD {
                    overshoots += 1;
                }
            }
        }
        last_direction = Some(direction);
    }

    let first = samples[0].position();
    let last = samples[samples.len() - 1].position();
    let direct_distance = first.distance_to(last);
    let path_efficiency = if total_distance > 0.0 {
        (direct_distance / total_distance * 100.0).min(100.0)
    } else {
        100.0
    };

    MovementAnalysis {
        overshoots,
        corrections,
        total_distance,
        path_efficiency,
    }
}

/// Absolute difference of two `atan2` angles folded into [0, π].
fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    diff.min(TAU - diff).clamp(0.0, PI)
}

/// Mean reaction time and path efficiency, summed overshoots and corrections.
/// `None` for an empty round.
pub fn summarize_accuracy(hits: &[AccuracyHit]) -> Option<AccuracyResult> {
    if hits.is_empty() {
        return None;
    }

    let count = hits.len() as f64;
    let avg_time = hits.iter().map(|hit| hit.reaction_time_ms).sum::<f64>() / count;
    let avg_efficiency = hits.iter().map(|hit| hit.path_efficiency).sum::<f64>() / count;

    Some(AccuracyResult {
        avg_time_ms: avg_time.round(),
        total_overshoots: hits.iter().map(|hit| hit.overshoots).sum(),
        total_corrections: hits.iter().map(|hit| hit.corrections).sum(),
        avg_path_efficiency: avg_efficiency.round(),
    })
}

/// Zero mean distance scores 100, a mean of 100 units or more scores 0.
/// `None` when no frame was sampled.
pub fn summarize_tracking(distances: &[f64]) -> Option<TrackingResult> {
    if distances.is_empty() {
        return None;
    }

    let avg_distance = distances.iter().sum::<f64>() / distances.len() as f64;
    Some(TrackingResult {
        avg_distance: avg_distance.round(),
        tracking_score: (100.0 - avg_distance).round().max(0.0),
    })
}
