use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::session::Candidate;

/// Tested fractions of the base sensitivity.
pub const CANDIDATE_MULTIPLIERS: [f64; 5] = [0.75, 0.9, 1.0, 1.1, 1.25];

/// Candidates in ascending multiplier order.
pub fn candidate_ladder(base_sensitivity: f64) -> Vec<Candidate> {
    CANDIDATE_MULTIPLIERS
        .iter()
        .map(|&multiplier| Candidate {
            sensitivity: round_to_thousandths(base_sensitivity * multiplier),
            multiplier,
            label: candidate_label(multiplier),
        })
        .collect()
}

/// Candidates in the order they will be evaluated. Shuffled once so the user
/// cannot anticipate which sensitivity is being tested.
pub fn generate_candidates<R: Rng + ?Sized>(base_sensitivity: f64, rng: &mut R) -> Vec<Candidate> {
    let mut candidates = candidate_ladder(base_sensitivity);
    candidates.shuffle(rng);
    candidates
}

fn round_to_thousandths(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

fn candidate_label(multiplier: f64) -> String {
    let percent = ((1.0 - multiplier).abs() * 100.0).round();
    if percent == 0.0 {
        "current".to_string()
    } else if multiplier < 1.0 {
        format!("{percent}% lower")
    } else {
        format!("{percent}% higher")
    }
}
