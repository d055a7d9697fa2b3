//! Combined score per candidate sensitivity.
//!
//! Overshoots and corrections dominate raw speed so that a sensitivity which is
//! merely fast but imprecise does not win. Path efficiency and tracking reward
//! controlled, direct motion.

use crate::error::TrainerError;
use crate::models::analytics::{AccuracyResult, TrackingResult};
use crate::models::session::{CandidateResult, Recommendation};

const BASE_SCORE: f64 = 100.0;
const OVERSHOOT_PENALTY: f64 = 8.0;
const CORRECTION_PENALTY: f64 = 3.0;
const TIME_BASELINE_MS: f64 = 350.0;
const TIME_PENALTY_DIVISOR: f64 = 5.0;
const PATH_BONUS_FACTOR: f64 = 0.3;
const ACCURACY_WEIGHT: f64 = 0.6;
const TRACKING_WEIGHT: f64 = 0.4;

/// Unclamped accuracy score; can leave [0, 100] in both directions.
pub fn accuracy_score(accuracy: &AccuracyResult) -> f64 {
    let overshoot_penalty = accuracy.total_overshoots as f64 * OVERSHOOT_PENALTY;
    let correction_penalty = accuracy.total_corrections as f64 * CORRECTION_PENALTY;
    let time_penalty = ((accuracy.avg_time_ms - TIME_BASELINE_MS) / TIME_PENALTY_DIVISOR).max(0.0);
    let path_bonus = accuracy.avg_path_efficiency * PATH_BONUS_FACTOR;

    BASE_SCORE - overshoot_penalty - correction_penalty - time_penalty + path_bonus
}

pub fn combined_score(accuracy: &AccuracyResult, tracking: &TrackingResult) -> u32 {
    let blended = accuracy_score(accuracy) * ACCURACY_WEIGHT + tracking.tracking_score * TRACKING_WEIGHT;
    blended.round().clamp(0.0, 100.0) as u32
}

/// Builds the result for one candidate. Both phases must have produced
/// analytics; a missing side is reported instead of being scored as zero.
pub fn score_candidate(
    sensitivity: f64,
    accuracy: Option<&AccuracyResult>,
    tracking: Option<&TrackingResult>,
) -> Result<CandidateResult, TrainerError> {
    let accuracy = accuracy.ok_or(TrainerError::IncompleteAnalytics {
        phase: "accuracy",
        sensitivity,
    })?;
    let tracking = tracking.ok_or(TrainerError::IncompleteAnalytics {
        phase: "tracking",
        sensitivity,
    })?;

    Ok(CandidateResult {
        sensitivity,
        accuracy_time_ms: accuracy.avg_time_ms,
        overshoots: accuracy.total_overshoots,
        corrections: accuracy.total_corrections,
        path_efficiency: accuracy.avg_path_efficiency,
        tracking_score: tracking.tracking_score,
        tracking_distance: tracking.avg_distance,
        combined_score: combined_score(accuracy, tracking),
    })
}

/// Highest combined score; ties go to the earliest evaluated candidate.
pub fn best_result(results: &[CandidateResult]) -> Option<&CandidateResult> {
    results.iter().fold(None, |best, current| match best {
        Some(best) if current.combined_score <= best.combined_score => Some(best),
        _ => Some(current),
    })
}

/// Display order, best first. The source slice keeps evaluation order.
pub fn ranked(results: &[CandidateResult]) -> Vec<&CandidateResult> {
    let mut view: Vec<&CandidateResult> = results.iter().collect();
    view.sort_by(|a, b| b.combined_score.cmp(&a.combined_score));
    view
}

pub fn recommend(base_sensitivity: f64, best: &CandidateResult) -> Recommendation {
    let to = best.sensitivity;
    if (to - base_sensitivity).abs() < 1e-9 {
        Recommendation::Keep { sensitivity: to }
    } else if to > base_sensitivity {
        Recommendation::Increase {
            from: base_sensitivity,
            to,
        }
    } else {
        Recommendation::Decrease {
            from: base_sensitivity,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accuracy(time: f64, overshoots: u32, corrections: u32, efficiency: f64) -> AccuracyResult {
        AccuracyResult {
            avg_time_ms: time,
            total_overshoots: overshoots,
            total_corrections: corrections,
            avg_path_efficiency: efficiency,
        }
    }

    fn tracking(score: f64) -> TrackingResult {
        TrackingResult {
            avg_distance: 100.0 - score,
            tracking_score: score,
        }
    }

    fn result(sensitivity: f64, combined_score: u32) -> CandidateResult {
        CandidateResult {
            sensitivity,
            accuracy_time_ms: 300.0,
            overshoots: 0,
            corrections: 0,
            path_efficiency: 100.0,
            tracking_score: 50.0,
            tracking_distance: 50.0,
            combined_score,
        }
    }

    #[test]
    fn fast_clean_round_scores_above_hundred_before_clamping() {
        let acc = accuracy(300.0, 0, 0, 100.0);
        assert!((accuracy_score(&acc) - 130.0).abs() < 1e-9);
        // 130 * 0.6 + 60 * 0.4 = 102 -> clamped.
        assert_eq!(combined_score(&acc, &tracking(60.0)), 100);
    }

    #[test]
    fn penalties_apply_per_event_and_per_slow_millisecond() {
        let acc = accuracy(450.0, 2, 4, 50.0);
        // 100 - 16 - 12 - 20 + 15 = 67
        assert!((accuracy_score(&acc) - 67.0).abs() < 1e-9);
        // 67 * 0.6 + 40 * 0.4 = 56.2
        assert_eq!(combined_score(&acc, &tracking(40.0)), 56);
    }

    #[test]
    fn extreme_penalties_clamp_to_zero() {
        let acc = accuracy(5_000.0, 50, 80, 0.0);
        assert!(accuracy_score(&acc) < 0.0);
        assert_eq!(combined_score(&acc, &tracking(0.0)), 0);
        assert_eq!(combined_score(&acc, &tracking(100.0)), 0);
    }

    #[test]
    fn missing_analytics_blocks_result() {
        let acc = accuracy(300.0, 0, 0, 100.0);
        let trk = tracking(60.0);

        let err = score_candidate(1.5, None, Some(&trk)).unwrap_err();
        assert!(matches!(err, TrainerError::IncompleteAnalytics { phase: "accuracy", .. }));

        let err = score_candidate(1.5, Some(&acc), None).unwrap_err();
        assert!(matches!(err, TrainerError::IncompleteAnalytics { phase: "tracking", .. }));

        let ok = score_candidate(1.5, Some(&acc), Some(&trk)).unwrap();
        assert_eq!(ok.sensitivity, 1.5);
        assert_eq!(ok.tracking_distance, 40.0);
        assert_eq!(ok.combined_score, 100);
    }

    #[test]
    fn best_result_picks_highest_score() {
        let results = vec![result(1.5, 72), result(2.2, 85)];
        assert_eq!(best_result(&results).unwrap().sensitivity, 2.2);
        assert_eq!(results[0].combined_score, 72);
        assert_eq!(results[1].combined_score, 85);
    }

    #[test]
    fn best_result_ties_resolve_to_first_evaluated() {
        let results = vec![result(1.8, 60), result(2.5, 90), result(1.5, 90)];
        assert_eq!(best_result(&results).unwrap().sensitivity, 2.5);
        assert!(best_result(&[]).is_none());
    }

    #[test]
    fn ranking_is_a_view_and_keeps_source_order() {
        let results = vec![result(1.5, 40), result(2.0, 90), result(2.5, 65)];
        let order: Vec<f64> = ranked(&results).iter().map(|r| r.sensitivity).collect();
        assert_eq!(order, vec![2.0, 2.5, 1.5]);
        assert_eq!(results[0].sensitivity, 1.5);
    }

    #[test]
    fn recommendation_compares_with_base() {
        assert_eq!(
            recommend(2.0, &result(2.2, 80)),
            Recommendation::Increase { from: 2.0, to: 2.2 }
        );
        assert_eq!(
            recommend(2.0, &result(1.5, 80)),
            Recommendation::Decrease { from: 2.0, to: 1.5 }
        );
        assert_eq!(
            recommend(2.0, &result(2.0, 80)),
            Recommendation::Keep { sensitivity: 2.0 }
        );
    }
}
