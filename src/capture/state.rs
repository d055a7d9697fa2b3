//! Shared state of the active training session.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;

use crate::capture::pointer_lock::LockHandle;
use crate::error::TrainerError;
use crate::models::events::SessionEvent;
use crate::session::runner::SessionHandle;

/// Data for one running session.
pub struct ActiveSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    /// Runner task and its input channel.
    pub handle: SessionHandle,
    /// Scheduler events not yet polled by the host.
    pub events: Receiver<SessionEvent>,
    /// Host view of the pointer capture.
    pub capture: LockHandle,
    /// Frame period the runner was spawned with, reused on restart.
    pub frame_period: Duration,
}

impl ActiveSession {
    pub fn ensure_id(&self, session_id: &str) -> Result<(), TrainerError> {
        if self.session_id != session_id {
            return Err(TrainerError::SessionMismatch {
                active: self.session_id.clone(),
                requested: session_id.to_string(),
            });
        }
        Ok(())
    }
}

/// At most one session per process.
#[derive(Clone, Default)]
pub struct TrainerState(pub Arc<Mutex<Option<ActiveSession>>>);

impl TrainerState {
    pub fn new() -> Self {
        Self::default()
    }
}
