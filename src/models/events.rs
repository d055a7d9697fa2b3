//! Input fed into a session and notifications emitted by it.

use serde::{Deserialize, Serialize};

use crate::models::session::{CandidateResult, SessionOutcome};

/// Top-level state of the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Setup,
    Countdown,
    Accuracy,
    Transition,
    Tracking,
    Finished,
}

impl Phase {
    /// Phases during which pointer motion moves the cursor.
    pub fn captures_motion(self) -> bool {
        matches!(self, Phase::Accuracy | Phase::Tracking)
    }
}

/// Sub-test a candidate is in, or about to enter during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TestPhase {
    #[default]
    Accuracy,
    Tracking,
}

/// Raw input delivered by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    /// Relative pointer motion in device counts.
    PointerMotion { dx: f64, dy: f64 },
    /// Primary button press inside the game area.
    Click,
    /// The exclusive capture was taken away (Esc, focus loss, ...).
    CaptureLost,
}

/// State-change notification for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    PhaseChanged {
        phase: Phase,
        upcoming: TestPhase,
        candidate_index: usize,
    },
    CountdownTick {
        remaining: u32,
    },
    #[serde(rename_all = "camelCase")]
    CandidateStarted {
        index: usize,
        total: usize,
        sensitivity: f64,
        browser_multiplier: f64,
    },
    CaptureChanged {
        held: bool,
    },
    CursorMoved {
        x: f64,
        y: f64,
    },
    TargetSpawned {
        x: f64,
        y: f64,
        radius: f64,
    },
    #[serde(rename_all = "camelCase")]
    TargetHit {
        hits: usize,
        reaction_time_ms: f64,
        overshoots: u32,
        corrections: u32,
    },
    #[serde(rename_all = "camelCase")]
    TrackingFrame {
        target_x: f64,
        target_y: f64,
        distance: f64,
        remaining_ms: f64,
    },
    CandidateScored {
        result: CandidateResult,
    },
    /// Finalisation was refused; the session will not advance on its own.
    Stalled {
        reason: String,
    },
    Finished {
        outcome: SessionOutcome,
    },
}

impl SessionEvent {
    /// Per-motion and per-frame traffic, safe to drop when a consumer lags.
    pub fn is_high_volume(&self) -> bool {
        matches!(
            self,
            SessionEvent::CursorMoved { .. } | SessionEvent::TrackingFrame { .. }
        )
    }
}
