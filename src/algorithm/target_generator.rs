use rand::Rng;

use crate::models::analytics::{Point, Target};
use crate::session::config::TrainerConfig;

/// Picks the next accuracy target.
///
/// Samples uniformly inside the spawn margin and resamples while the point is
/// closer than `min_spawn_separation` to the previous target or to the
/// cursor. After `max_spawn_attempts` samples the last one is kept.
pub fn spawn_static_target<R: Rng + ?Sized>(
    rng: &mut R,
    previous: Option<Point>,
    cursor: Point,
    config: &TrainerConfig,
) -> Target {
    let (min_x, max_x) = spawn_span(config.canvas_width, config.spawn_margin);
    let (min_y, max_y) = spawn_span(config.canvas_height, config.spawn_margin);
    let attempts = config.max_spawn_attempts.max(1);

    let mut candidate = Point::default();
    for _ in 0..attempts {
        candidate = Point::new(
            min_x + rng.random::<f64>() * (max_x - min_x),
            min_y + rng.random::<f64>() * (max_y - min_y),
        );

        let too_close_to_cursor = candidate.distance_to(cursor) < config.min_spawn_separation;
        let too_close_to_previous = previous
            .is_some_and(|prev| candidate.distance_to(prev) < config.min_spawn_separation);
        if !too_close_to_cursor && !too_close_to_previous {
            break;
        }
    }

    Target {
        x: candidate.x,
        y: candidate.y,
        radius: config.target_radius,
    }
}

fn spawn_span(extent: f64, margin: f64) -> (f64, f64) {
    let margin = margin.clamp(0.0, extent / 2.0);
    (margin, extent - margin)
}

/// Parametric path of the moving target.
#[derive(Debug, Clone, Copy)]
pub struct TrackingPath {
    pub radius_x: f64,
    pub radius_y: f64,
    /// Radians per millisecond.
    pub angular_speed: f64,
    pub wobble_amplitude: f64,
    /// Radians per millisecond of the wobble envelope.
    pub wobble_speed: f64,
}

impl Default for TrackingPath {
    fn default() -> Self {
        Self {
            radius_x: 200.0,
            radius_y: 120.0,
            angular_speed: 0.0015,
            wobble_amplitude: 30.0,
            wobble_speed: 0.003,
        }
    }
}

impl TrackingPath {
    /// Target position `elapsed_ms` after the tracking phase started.
    pub fn position(&self, elapsed_ms: f64, canvas_width: f64, canvas_height: f64) -> Point {
        let angle = elapsed_ms * self.angular_speed;
        let wobble = (elapsed_ms * self.wobble_speed).sin() * self.wobble_amplitude;

        Point::new(
            canvas_width / 2.0 + angle.cos() * self.radius_x + (angle * 2.0).sin() * wobble,
            canvas_height / 2.0 + angle.sin() * self.radius_y + (angle * 1.5).cos() * wobble * 0.5,
        )
    }
}
