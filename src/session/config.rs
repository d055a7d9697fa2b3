use serde::{Deserialize, Serialize};

/// Tunables of the trainer. Defaults match the shipped trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainerConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub target_radius: f64,
    pub targets_per_round: usize,
    pub tracking_duration_ms: f64,
    pub countdown_from: u32,
    pub countdown_tick_ms: f64,
    pub transition_ms: f64,
    /// Inset from every canvas edge for static target spawns.
    pub spawn_margin: f64,
    pub min_spawn_separation: f64,
    pub max_spawn_attempts: u32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 600.0,
            target_radius: 25.0,
            targets_per_round: 6,
            tracking_duration_ms: 5_000.0,
            countdown_from: 3,
            countdown_tick_ms: 1_000.0,
            transition_ms: 1_500.0,
            spawn_margin: 120.0,
            min_spawn_separation: 180.0,
            max_spawn_attempts: 20,
        }
    }
}

impl TrainerConfig {
    /// Replaces degenerate values with defaults so the session can always make progress.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.canvas_width.is_finite() && self.canvas_width > 0.0) {
            self.canvas_width = defaults.canvas_width;
        }
        if !(self.canvas_height.is_finite() && self.canvas_height > 0.0) {
            self.canvas_height = defaults.canvas_height;
        }
        if !(self.target_radius.is_finite() && self.target_radius > 0.0) {
            self.target_radius = defaults.target_radius;
        }
        self.targets_per_round = self.targets_per_round.max(1);
        if !(self.tracking_duration_ms.is_finite() && self.tracking_duration_ms > 0.0) {
            self.tracking_duration_ms = defaults.tracking_duration_ms;
        }
        if !(self.countdown_tick_ms.is_finite() && self.countdown_tick_ms >= 0.0) {
            self.countdown_tick_ms = defaults.countdown_tick_ms;
        }
        if !(self.transition_ms.is_finite() && self.transition_ms >= 0.0) {
            self.transition_ms = defaults.transition_ms;
        }
        if !(self.spawn_margin.is_finite() && self.spawn_margin >= 0.0) {
            self.spawn_margin = defaults.spawn_margin;
        }
        if !(self.min_spawn_separation.is_finite() && self.min_spawn_separation >= 0.0) {
            self.min_spawn_separation = defaults.min_spawn_separation;
        }
        self.max_spawn_attempts = self.max_spawn_attempts.max(1);
        self
    }
}
