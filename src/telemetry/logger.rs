//! Session telemetry through the `log` facade.
//!
//! `LoggingObserver` mirrors every scheduler event to the log at a level that
//! matches its volume: phase changes and results at `info`, hits at `debug`,
//! per-frame and per-motion traffic at `trace`.

use crate::models::events::SessionEvent;
use crate::session::observer::SessionObserver;

/// Writes session events to the global logger.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    session_id: String,
}

impl LoggingObserver {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

impl SessionObserver for LoggingObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        let id = &self.session_id;
        match event {
            SessionEvent::PhaseChanged {
                phase,
                upcoming,
                candidate_index,
            } => log::info!("[{id}] phase {phase:?} (next {upcoming:?}, candidate {candidate_index})"),
            SessionEvent::CandidateStarted {
                index,
                total,
                sensitivity,
                browser_multiplier,
            } => log::info!(
                "[{id}] candidate {}/{total}: sensitivity {sensitivity} (x{browser_multiplier:.4})",
                index + 1
            ),
            SessionEvent::CandidateScored { result } => log::info!(
                "[{id}] sensitivity {} scored {} (time {}ms, overshoots {}, corrections {}, tracking {})",
                result.sensitivity,
                result.combined_score,
                result.accuracy_time_ms,
                result.overshoots,
                result.corrections,
                result.tracking_score
            ),
            SessionEvent::Finished { outcome } => log::info!(
                "[{id}] finished: best {} ({:?})",
                outcome.best_sensitivity,
                outcome.recommendation
            ),
            SessionEvent::Stalled { reason } => log::warn!("[{id}] stalled: {reason}"),
            SessionEvent::CaptureChanged { held } => log::debug!("[{id}] capture held={held}"),
            SessionEvent::CountdownTick { remaining } => log::debug!("[{id}] countdown {remaining}"),
            SessionEvent::TargetSpawned { x, y, radius } => {
                log::debug!("[{id}] target at ({x:.0}, {y:.0}) r={radius}")
            }
            SessionEvent::TargetHit {
                hits,
                reaction_time_ms,
                overshoots,
                corrections,
            } => log::debug!(
                "[{id}] hit #{hits} in {reaction_time_ms:.0}ms (overshoots {overshoots}, corrections {corrections})"
            ),
            SessionEvent::CursorMoved { x, y } => log::trace!("[{id}] cursor ({x:.1}, {y:.1})"),
            SessionEvent::TrackingFrame {
                distance,
                remaining_ms,
                ..
            } => log::trace!("[{id}] frame distance={distance:.1} remaining={remaining_ms:.0}ms"),
        }
    }
}
