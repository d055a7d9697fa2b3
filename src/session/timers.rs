//! Scheduled callbacks of the phase scheduler, modelled as data so the host
//! decides how to wait (tokio timers, a game loop, a test clock).

/// Work deferred to a later instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    CountdownTick,
    StartAccuracy,
    StartTracking,
}

/// One pending deadline at most; scheduling replaces it.
#[derive(Debug, Default, Clone)]
pub struct Timer {
    pending: Option<(f64, TimerAction)>,
}

impl Timer {
    pub fn schedule(&mut self, deadline_ms: f64, action: TimerAction) {
        self.pending = Some((deadline_ms, action));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<f64> {
        self.pending.map(|(deadline, _)| deadline)
    }

    /// Takes the action if its deadline has passed.
    pub fn take_due(&mut self, now_ms: f64) -> Option<TimerAction> {
        match self.pending {
            Some((deadline, action)) if deadline <= now_ms => {
                self.pending = None;
                Some(action)
            }
            _ => None,
        }
    }
}

/// Per-frame callback loop of the tracking phase.
#[derive(Debug, Default, Clone)]
pub struct FrameLoop {
    active: bool,
    frames: u64,
}

impl FrameLoop {
    pub fn start(&mut self) {
        self.active = true;
        self.frames = 0;
    }

    pub fn cancel(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn record_frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
