//! Synthetic player for headless sessions.
//!
//! The hand is calibrated to one preferred sensitivity: a flick covers the
//! distance that would be right at that sensitivity. At a higher candidate the
//! cursor lands past the target and has to come back, at a lower one it falls
//! short and needs a second push. Tracking follows the moving target with a
//! fixed fraction of the remaining distance per frame.

use crate::capture::motion::browser_multiplier;
use crate::models::analytics::Point;
use crate::models::events::{InputEvent, Phase, SessionEvent};

/// One input the player wants to send, `delay_ms` after the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedInput {
    pub delay_ms: f64,
    pub input: InputEvent,
}

impl PlannedInput {
    fn after(delay_ms: f64, input: InputEvent) -> Self {
        Self { delay_ms, input }
    }
}

#[derive(Debug, Clone)]
pub struct AutoPilot {
    hand_multiplier: f64,
    multiplier: f64,
    cursor: Point,
    target: Option<(Point, f64)>,
    phase: Phase,
    aiming: bool,
    capture_lost: bool,
    corrections_left: u32,

    /// Delay between a target appearing and the first flick.
    pub reaction_ms: f64,
    /// Delay between landing and the corrective push.
    pub correction_ms: f64,
    /// Delay between settling on the target and clicking.
    pub click_ms: f64,
    /// Fraction of the tracking error closed per frame.
    pub follow_gain: f64,
    /// A landing within this fraction of the radius is clicked as is.
    pub click_tolerance: f64,
    pub max_corrections: u32,
}

impl AutoPilot {
    pub fn new(dpi: u32, preferred_sensitivity: f64) -> Self {
        let hand_multiplier = browser_multiplier(dpi, preferred_sensitivity);
        Self {
            hand_multiplier,
            multiplier: hand_multiplier,
            cursor: Point::default(),
            target: None,
            phase: Phase::Setup,
            aiming: false,
            capture_lost: false,
            corrections_left: 0,
            reaction_ms: 180.0,
            correction_ms: 90.0,
            click_ms: 40.0,
            follow_gain: 0.35,
            click_tolerance: 0.8,
            max_corrections: 4,
        }
    }

    /// Inputs to send in response to one session event.
    pub fn react(&mut self, event: &SessionEvent) -> Vec<PlannedInput> {
        match event {
            SessionEvent::PhaseChanged { phase, .. } => {
                self.phase = *phase;
                if *phase != Phase::Accuracy {
                    self.target = None;
                    self.aiming = false;
                }
                Vec::new()
            }
            SessionEvent::CandidateStarted {
                browser_multiplier, ..
            } => {
                self.multiplier = *browser_multiplier;
                Vec::new()
            }
            SessionEvent::TargetSpawned { x, y, radius } => {
                self.target = Some((Point::new(*x, *y), *radius));
                self.aiming = true;
                self.corrections_left = self.max_corrections;
                vec![self.flick()]
            }
            SessionEvent::CursorMoved { x, y } => {
                self.cursor = Point::new(*x, *y);
                if self.phase == Phase::Accuracy && self.aiming {
                    self.settle()
                } else {
                    Vec::new()
                }
            }
            SessionEvent::CaptureChanged { held: false } => {
                self.capture_lost = true;
                // A click inside the game area asks for capture again.
                if self.phase == Phase::Accuracy {
                    vec![PlannedInput::after(self.reaction_ms, InputEvent::Click)]
                } else {
                    Vec::new()
                }
            }
            SessionEvent::CaptureChanged { held: true } => {
                let resumed = std::mem::take(&mut self.capture_lost);
                if resumed && self.phase == Phase::Accuracy && self.aiming {
                    self.settle()
                } else {
                    Vec::new()
                }
            }
            SessionEvent::TrackingFrame {
                target_x, target_y, ..
            } => {
                let dx = (target_x - self.cursor.x) * self.follow_gain / self.hand_multiplier;
                let dy = (target_y - self.cursor.y) * self.follow_gain / self.hand_multiplier;
                vec![PlannedInput::after(
                    0.0,
                    InputEvent::PointerMotion { dx, dy },
                )]
            }
            _ => Vec::new(),
        }
    }

    fn flick(&self) -> PlannedInput {
        let Some((target, _)) = self.target else {
            return PlannedInput::after(self.reaction_ms, InputEvent::PointerMotion { dx: 0.0, dy: 0.0 });
        };
        PlannedInput::after(
            self.reaction_ms,
            InputEvent::PointerMotion {
                dx: (target.x - self.cursor.x) / self.hand_multiplier,
                dy: (target.y - self.cursor.y) / self.hand_multiplier,
            },
        )
    }

    /// After a landing: click when on target, otherwise push with the
    /// multiplier learnt from the landing.
    fn settle(&mut self) -> Vec<PlannedInput> {
        let Some((target, radius)) = self.target else {
            return Vec::new();
        };

        let distance = self.cursor.distance_to(target);
        if distance <= radius * self.click_tolerance || self.corrections_left == 0 {
            self.aiming = false;
            return vec![PlannedInput::after(self.click_ms, InputEvent::Click)];
        }

        self.corrections_left -= 1;
        vec![PlannedInput::after(
            self.correction_ms,
            InputEvent::PointerMotion {
                dx: (target.x - self.cursor.x) / self.multiplier,
                dy: (target.y - self.cursor.y) / self.multiplier,
            },
        )]
    }
}
