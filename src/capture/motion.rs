//! Pointer-motion capture: raw device deltas to a clamped canvas cursor.

use crate::models::analytics::{MovementSample, Point};

const BASE_DPI: f64 = 800.0;
const BASE_SENSITIVITY: f64 = 1.0;
const BASE_MULTIPLIER: f64 = 0.5;

/// Canvas units per raw device count for a DPI / in-game sensitivity pair.
pub fn browser_multiplier(dpi: u32, sensitivity: f64) -> f64 {
    (dpi as f64 / BASE_DPI) * (sensitivity / BASE_SENSITIVITY) * BASE_MULTIPLIER
}

/// Owns the cursor and the movement path of the current attempt.
#[derive(Debug, Clone)]
pub struct MotionCapture {
    width: f64,
    height: f64,
    multiplier: f64,
    cursor: Point,
    samples: Vec<MovementSample>,
}

impl MotionCapture {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            multiplier: 1.0,
            cursor: Point::new(width / 2.0, height / 2.0),
            samples: Vec::new(),
        }
    }

    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier;
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn cursor(&self) -> Point {
        self.cursor
    }

    pub fn samples(&self) -> &[MovementSample] {
        &self.samples
    }

    /// Moves the cursor back to the canvas center.
    pub fn center(&mut self) {
        self.cursor = Point::new(self.width / 2.0, self.height / 2.0);
    }

    /// Starts a new attempt whose path begins at the current cursor.
    pub fn reset_path(&mut self, now_ms: f64) {
        self.samples.clear();
        self.samples.push(MovementSample {
            x: self.cursor.x,
            y: self.cursor.y,
            ts_ms: now_ms,
            raw_dx: 0.0,
            raw_dy: 0.0,
        });
    }

    pub fn clear_path(&mut self) {
        self.samples.clear();
    }

    /// Applies one raw motion event and records it. No wraparound: the
    /// cursor stops at the canvas edges.
    pub fn apply(&mut self, raw_dx: f64, raw_dy: f64, now_ms: f64) -> Point {
        let x = (self.cursor.x + raw_dx * self.multiplier).clamp(0.0, self.width);
        let y = (self.cursor.y + raw_dy * self.multiplier).clamp(0.0, self.height);
        self.cursor = Point::new(x, y);

        self.samples.push(MovementSample {
            x,
            y,
            ts_ms: now_ms,
            raw_dx,
            raw_dy,
        });

        self.cursor
    }
}
