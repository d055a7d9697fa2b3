//! Measurement data collected during the accuracy and tracking phases.

use serde::{Deserialize, Serialize};

/// A position in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// One captured pointer-motion step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSample {
    /// Cursor position after scaling and clamping.
    pub x: f64,
    pub y: f64,
    /// Monotonic milliseconds.
    pub ts_ms: f64,
    /// Unscaled device deltas.
    pub raw_dx: f64,
    pub raw_dy: f64,
}

impl MovementSample {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Static target of the accuracy phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Target {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn contains(&self, point: Point) -> bool {
        self.center().distance_to(point) <= self.radius
    }
}

/// Analytics for a single successful hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyHit {
    pub reaction_time_ms: f64,
    pub overshoots: u32,
    pub corrections: u32,
    /// 0.0–100.0
    pub path_efficiency: f64,
}

/// Reduction of all hits of one accuracy phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyResult {
    pub avg_time_ms: f64,
    pub total_overshoots: u32,
    pub total_corrections: u32,
    pub avg_path_efficiency: f64,
}

/// Reduction of the per-frame distances of one tracking phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResult {
    pub avg_distance: f64,
    /// 0.0–100.0, higher is closer.
    pub tracking_score: f64,
}
