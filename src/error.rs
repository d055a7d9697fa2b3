use thiserror::Error;

use crate::models::events::Phase;

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("Invalid base sensitivity: {0}")]
    InvalidBaseSensitivity(String),

    #[error("Missing {phase} analytics for sensitivity {sensitivity}")]
    IncompleteAnalytics {
        phase: &'static str,
        sensitivity: f64,
    },

    #[error("Cannot {action} while in {phase:?} phase")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("Session already in progress")]
    SessionInProgress,

    #[error("No active session")]
    NoActiveSession,

    #[error("Session ID mismatch: active={active}, requested={requested}")]
    SessionMismatch { active: String, requested: String },

    #[error("Session is still running")]
    SessionRunning,

    #[error("Session ended without an outcome")]
    NoOutcome,

    #[error("Session runner error: {0}")]
    Runner(String),
}

impl From<TrainerError> for String {
    fn from(err: TrainerError) -> Self {
        err.to_string()
    }
}
