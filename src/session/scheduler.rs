//! Phase scheduler of a sensitivity session.
//!
//! ```text
//! setup -> countdown -> accuracy -> transition -> tracking -> transition -> accuracy ... -> finished
//! ```
//!
//! The scheduler is synchronous. Time is injected as monotonic milliseconds and
//! deferred work is exposed through [`PhaseScheduler::next_deadline`] and
//! [`PhaseScheduler::frame_loop_active`], so the host owns all waiting.
//! Every mutation happens inside one call; there is nothing to lock.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::Serialize;

use crate::algorithm::candidates::generate_candidates;
use crate::algorithm::movement_analysis::{analyze_movement, summarize_accuracy, summarize_tracking};
use crate::algorithm::scoring::{best_result, recommend, score_candidate};
use crate::algorithm::target_generator::{spawn_static_target, TrackingPath};
use crate::capture::motion::{browser_multiplier, MotionCapture};
use crate::capture::pointer_lock::PointerLock;
use crate::error::TrainerError;
use crate::models::analytics::{AccuracyHit, AccuracyResult, Point, Target};
use crate::models::events::{InputEvent, Phase, SessionEvent, TestPhase};
use crate::models::session::{Candidate, CandidateResult, SessionOutcome, SessionSettings};
use crate::session::config::TrainerConfig;
use crate::session::observer::SessionObserver;
use crate::session::timers::{FrameLoop, Timer, TimerAction};

/// What a presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub upcoming: TestPhase,
    pub countdown: u32,
    pub candidate_index: usize,
    pub candidate_total: usize,
    pub sensitivity: Option<f64>,
    pub browser_multiplier: f64,
    pub targets_hit: usize,
    pub targets_per_round: usize,
    pub cursor: Point,
    pub target: Option<Target>,
    pub tracking_target: Option<Point>,
    pub tracking_time_left_ms: Option<f64>,
    pub capture_held: bool,
    pub completed: usize,
}

pub struct PhaseScheduler {
    config: TrainerConfig,
    settings: SessionSettings,
    rng: StdRng,
    lock: Box<dyn PointerLock>,
    capture_held: bool,
    observers: Vec<Box<dyn SessionObserver>>,
    tracking_path: TrackingPath,

    phase: Phase,
    upcoming: TestPhase,
    countdown: u32,
    candidates: Vec<Candidate>,
    candidate_index: usize,

    motion: MotionCapture,
    target: Option<Target>,
    target_spawned_at: f64,
    targets_hit: usize,
    hits: Vec<AccuracyHit>,
    accuracy_result: Option<AccuracyResult>,

    tracking_started_at: f64,
    tracking_target: Point,
    tracking_distances: Vec<f64>,

    results: Vec<CandidateResult>,
    completed_at: Option<DateTime<Utc>>,

    timer: Timer,
    frames: FrameLoop,
}

impl PhaseScheduler {
    pub fn new(
        config: TrainerConfig,
        settings: SessionSettings,
        lock: Box<dyn PointerLock>,
        rng: StdRng,
    ) -> Self {
        let config = config.sanitized();
        let motion = MotionCapture::new(config.canvas_width, config.canvas_height);
        let capture_held = lock.is_held();

        Self {
            config,
            settings,
            rng,
            lock,
            capture_held,
            observers: Vec::new(),
            tracking_path: TrackingPath::default(),
            phase: Phase::Setup,
            upcoming: TestPhase::Accuracy,
            countdown: 0,
            candidates: Vec::new(),
            candidate_index: 0,
            motion,
            target: None,
            target_spawned_at: 0.0,
            targets_hit: 0,
            hits: Vec::new(),
            accuracy_result: None,
            tracking_started_at: 0.0,
            tracking_target: Point::default(),
            tracking_distances: Vec::new(),
            results: Vec::new(),
            completed_at: None,
            timer: Timer::default(),
            frames: FrameLoop::default(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn current_candidate(&self) -> Option<&Candidate> {
        self.candidates.get(self.candidate_index)
    }

    /// Results in evaluation order.
    pub fn results(&self) -> &[CandidateResult] {
        &self.results
    }

    /// Deadline of the pending timer, if any.
    pub fn next_deadline(&self) -> Option<f64> {
        self.timer.deadline()
    }

    /// Whether the host should deliver animation frames.
    pub fn frame_loop_active(&self) -> bool {
        self.frames.is_active()
    }

    pub fn start(&mut self, now_ms: f64) -> Result<(), TrainerError> {
        if self.phase != Phase::Setup {
            return Err(TrainerError::InvalidPhase {
                action: "start a session",
                phase: self.phase,
            });
        }

        self.candidates = generate_candidates(self.settings.base_sensitivity, &mut self.rng);
        self.candidate_index = 0;
        self.results.clear();
        self.completed_at = None;
        self.accuracy_result = None;
        self.upcoming = TestPhase::Accuracy;
        self.countdown = self.config.countdown_from;

        log::info!(
            "start: dpi={} base={} order={:?}",
            self.settings.dpi,
            self.settings.base_sensitivity,
            self.candidates
                .iter()
                .map(|candidate| candidate.sensitivity)
                .collect::<Vec<_>>()
        );

        self.set_phase(Phase::Countdown);
        self.emit(SessionEvent::CountdownTick {
            remaining: self.countdown,
        });

        if self.countdown == 0 {
            self.start_accuracy_phase(now_ms);
        } else {
            self.timer
                .schedule(now_ms + self.config.countdown_tick_ms, TimerAction::CountdownTick);
        }
        Ok(())
    }

    /// Runs every timer action that is due at `now_ms`.
    pub fn advance(&mut self, now_ms: f64) {
        while let Some(action) = self.timer.take_due(now_ms) {
            match action {
                TimerAction::CountdownTick => self.countdown_tick(now_ms),
                TimerAction::StartAccuracy => self.start_accuracy_phase(now_ms),
                TimerAction::StartTracking => self.start_tracking_phase(now_ms),
            }
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now_ms: f64) {
        match event {
            InputEvent::PointerMotion { dx, dy } => self.on_pointer_motion(dx, dy, now_ms),
            InputEvent::Click => self.on_click(now_ms),
            InputEvent::CaptureLost => self.on_capture_lost(),
        }
    }

    /// One animation frame of the tracking phase.
    pub fn on_frame(&mut self, now_ms: f64) {
        if self.phase != Phase::Tracking || !self.frames.is_active() {
            return;
        }

        let elapsed = (now_ms - self.tracking_started_at).max(0.0);
        let remaining = self.config.tracking_duration_ms - elapsed;
        if remaining <= 0.0 {
            self.finish_tracking_phase(now_ms);
            return;
        }

        let target = self.tracking_path.position(
            elapsed,
            self.config.canvas_width,
            self.config.canvas_height,
        );
        self.tracking_target = target;
        let distance = self.motion.cursor().distance_to(target);
        self.tracking_distances.push(distance);
        self.frames.record_frame();

        log::trace!("on_frame: elapsed={elapsed:.1} distance={distance:.1}");
        self.emit(SessionEvent::TrackingFrame {
            target_x: target.x,
            target_y: target.y,
            distance,
            remaining_ms: remaining,
        });
    }

    /// Cancels pending work, releases capture and returns to setup.
    pub fn abort(&mut self) {
        log::info!(
            "abort: phase={:?} candidate={}/{}",
            self.phase,
            self.candidate_index,
            self.candidates.len()
        );

        self.timer.cancel();
        self.frames.cancel();
        self.release_capture();

        self.target = None;
        self.targets_hit = 0;
        self.hits.clear();
        self.accuracy_result = None;
        self.tracking_distances.clear();
        self.motion.clear_path();
        self.motion.center();
        self.candidates.clear();
        self.candidate_index = 0;
        self.results.clear();
        self.completed_at = None;
        self.countdown = 0;
        self.upcoming = TestPhase::Accuracy;

        self.set_phase(Phase::Setup);
    }

    /// Leaves the result screen for another run with the same settings.
    pub fn restart(&mut self) -> Result<(), TrainerError> {
        if self.phase != Phase::Finished {
            return Err(TrainerError::InvalidPhase {
                action: "restart",
                phase: self.phase,
            });
        }

        self.results.clear();
        self.candidates.clear();
        self.candidate_index = 0;
        self.completed_at = None;
        self.motion.center();
        self.set_phase(Phase::Setup);
        Ok(())
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        if self.phase != Phase::Finished {
            return None;
        }
        let best = best_result(&self.results)?;

        Some(SessionOutcome {
            best_sensitivity: best.sensitivity,
            dpi: self.settings.dpi,
            base_sensitivity: self.settings.base_sensitivity,
            all_results: self.results.clone(),
            recommendation: recommend(self.settings.base_sensitivity, best),
            completed_at: self.completed_at.unwrap_or_else(Utc::now),
        })
    }

    pub fn snapshot(&self, now_ms: f64) -> SessionSnapshot {
        let tracking = self.phase == Phase::Tracking;
        SessionSnapshot {
            phase: self.phase,
            upcoming: self.upcoming,
            countdown: self.countdown,
            candidate_index: self.candidate_index,
            candidate_total: self.candidates.len(),
            sensitivity: self.current_candidate().map(|candidate| candidate.sensitivity),
            browser_multiplier: self.motion.multiplier(),
            targets_hit: self.targets_hit,
            targets_per_round: self.config.targets_per_round,
            cursor: self.motion.cursor(),
            target: self.target.filter(|_| self.phase == Phase::Accuracy),
            tracking_target: tracking.then_some(self.tracking_target),
            tracking_time_left_ms: tracking.then(|| {
                (self.config.tracking_duration_ms - (now_ms - self.tracking_started_at)).max(0.0)
            }),
            capture_held: self.lock.is_held(),
            completed: self.results.len(),
        }
    }

    fn countdown_tick(&mut self, now_ms: f64) {
        self.countdown = self.countdown.saturating_sub(1);
        self.emit(SessionEvent::CountdownTick {
            remaining: self.countdown,
        });

        if self.countdown > 0 {
            self.timer
                .schedule(now_ms + self.config.countdown_tick_ms, TimerAction::CountdownTick);
        } else {
            self.start_accuracy_phase(now_ms);
        }
    }

    fn start_accuracy_phase(&mut self, now_ms: f64) {
        let Some(candidate) = self.current_candidate().cloned() else {
            log::warn!(
                "start_accuracy_phase: no candidate at index {}",
                self.candidate_index
            );
            return;
        };

        let multiplier = browser_multiplier(self.settings.dpi, candidate.sensitivity);
        self.motion.set_multiplier(multiplier);
        self.motion.center();
        self.target = None;
        self.targets_hit = 0;
        self.hits.clear();
        self.accuracy_result = None;
        self.tracking_distances.clear();
        self.upcoming = TestPhase::Accuracy;

        log::info!(
            "start_accuracy_phase: candidate={}/{} sensitivity={} ({}) multiplier={multiplier:.4}",
            self.candidate_index + 1,
            self.candidates.len(),
            candidate.sensitivity,
            candidate.label
        );

        self.emit(SessionEvent::CandidateStarted {
            index: self.candidate_index,
            total: self.candidates.len(),
            sensitivity: candidate.sensitivity,
            browser_multiplier: multiplier,
        });
        self.set_phase(Phase::Accuracy);
        self.emit_cursor();
        self.spawn_target(now_ms);
        self.acquire_capture();
    }

    fn spawn_target(&mut self, now_ms: f64) {
        let previous = self.target.map(|target| target.center());
        let target = spawn_static_target(&mut self.rng, previous, self.motion.cursor(), &self.config);

        self.target = Some(target);
        self.target_spawned_at = now_ms;
        self.motion.reset_path(now_ms);

        self.emit(SessionEvent::TargetSpawned {
            x: target.x,
            y: target.y,
            radius: target.radius,
        });
    }

    fn on_pointer_motion(&mut self, dx: f64, dy: f64, now_ms: f64) {
        self.sync_capture();
        if !self.phase.captures_motion() || !self.capture_held {
            return;
        }
        if !(dx.is_finite() && dy.is_finite()) {
            log::trace!("on_pointer_motion: dropping non-finite delta ({dx}, {dy})");
            return;
        }

        self.motion.apply(dx, dy, now_ms);
        self.emit_cursor();
    }

    fn on_click(&mut self, now_ms: f64) {
        if self.phase != Phase::Accuracy {
            return;
        }

        self.sync_capture();
        if !self.capture_held {
            self.acquire_capture();
            return;
        }

        let Some(target) = self.target else {
            return;
        };
        if !target.contains(self.motion.cursor()) {
            log::trace!("on_click: miss at {:?}", self.motion.cursor());
            return;
        }

        self.register_hit(now_ms);
    }

    fn register_hit(&mut self, now_ms: f64) {
        let analysis = analyze_movement(self.motion.samples());
        let hit = AccuracyHit {
            reaction_time_ms: (now_ms - self.target_spawned_at).max(0.0),
            overshoots: analysis.overshoots,
            corrections: analysis.corrections,
            path_efficiency: analysis.path_efficiency,
        };
        self.hits.push(hit);
        self.targets_hit += 1;

        log::debug!(
            "register_hit: {}/{} time={:.0}ms overshoots={} corrections={} efficiency={:.1}",
            self.targets_hit,
            self.config.targets_per_round,
            hit.reaction_time_ms,
            hit.overshoots,
            hit.corrections,
            hit.path_efficiency
        );

        self.emit(SessionEvent::TargetHit {
            hits: self.targets_hit,
            reaction_time_ms: hit.reaction_time_ms,
            overshoots: hit.overshoots,
            corrections: hit.corrections,
        });

        if self.targets_hit >= self.config.targets_per_round {
            self.finish_accuracy_phase(now_ms);
        } else {
            self.spawn_target(now_ms);
        }
    }

    fn finish_accuracy_phase(&mut self, now_ms: f64) {
        self.target = None;
        self.motion.clear_path();
        self.accuracy_result = summarize_accuracy(&self.hits);
        self.hits.clear();

        match &self.accuracy_result {
            Some(result) => log::debug!("finish_accuracy_phase: {result:?}"),
            None => log::warn!("finish_accuracy_phase: no hits recorded"),
        }

        self.upcoming = TestPhase::Tracking;
        self.set_phase(Phase::Transition);
        self.timer
            .schedule(now_ms + self.config.transition_ms, TimerAction::StartTracking);
    }

    fn start_tracking_phase(&mut self, now_ms: f64) {
        self.motion.center();
        self.motion.clear_path();
        self.tracking_started_at = now_ms;
        self.tracking_distances.clear();
        self.tracking_target = self.tracking_path.position(
            0.0,
            self.config.canvas_width,
            self.config.canvas_height,
        );
        self.upcoming = TestPhase::Tracking;

        self.set_phase(Phase::Tracking);
        self.emit_cursor();
        self.frames.start();
        self.acquire_capture();
    }

    fn finish_tracking_phase(&mut self, now_ms: f64) {
        self.frames.cancel();

        let Some(sensitivity) = self.current_candidate().map(|candidate| candidate.sensitivity) else {
            log::warn!("finish_tracking_phase: no active candidate");
            return;
        };
        let tracking = summarize_tracking(&self.tracking_distances);
        let result = match score_candidate(
            sensitivity,
            self.accuracy_result.as_ref(),
            tracking.as_ref(),
        ) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("finish_tracking_phase: {err}");
                self.emit(SessionEvent::Stalled {
                    reason: err.to_string(),
                });
                return;
            }
        };

        log::info!(
            "finish_tracking_phase: sensitivity={} score={} frames={}",
            result.sensitivity,
            result.combined_score,
            self.frames.frames()
        );

        self.tracking_distances.clear();
        self.accuracy_result = None;
        self.motion.clear_path();
        self.results.push(result.clone());
        self.emit(SessionEvent::CandidateScored { result });

        self.candidate_index += 1;
        if self.candidate_index >= self.candidates.len() {
            self.release_capture();
            self.completed_at = Some(Utc::now());
            self.set_phase(Phase::Finished);
            if let Some(outcome) = self.outcome() {
                log::info!(
                    "finish_tracking_phase: session finished, best={}",
                    outcome.best_sensitivity
                );
                self.emit(SessionEvent::Finished { outcome });
            }
        } else {
            self.upcoming = TestPhase::Accuracy;
            self.set_phase(Phase::Transition);
            self.timer
                .schedule(now_ms + self.config.transition_ms, TimerAction::StartAccuracy);
        }
    }

    fn on_capture_lost(&mut self) {
        self.lock.release();
        self.sync_capture();
    }

    fn acquire_capture(&mut self) {
        if !self.lock.is_held() && !self.lock.acquire() {
            log::warn!("acquire_capture: pointer capture request was refused");
        }
        self.sync_capture();
    }

    fn release_capture(&mut self) {
        if self.lock.is_held() {
            self.lock.release();
        }
        self.sync_capture();
    }

    /// Mirrors the lock state and notifies on change; the host may revoke the
    /// lock at any time.
    fn sync_capture(&mut self) {
        let held = self.lock.is_held();
        if held != self.capture_held {
            self.capture_held = held;
            log::debug!("capture: held={held}");
            self.emit(SessionEvent::CaptureChanged { held });
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        log::debug!("phase: {phase:?} (next {:?})", self.upcoming);
        self.emit(SessionEvent::PhaseChanged {
            phase,
            upcoming: self.upcoming,
            candidate_index: self.candidate_index,
        });
    }

    fn emit_cursor(&mut self) {
        let cursor = self.motion.cursor();
        self.emit(SessionEvent::CursorMoved {
            x: cursor.x,
            y: cursor.y,
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

impl Drop for PhaseScheduler {
    fn drop(&mut self) {
        self.timer.cancel();
        self.frames.cancel();
        if self.lock.is_held() {
            self.lock.release();
        }
    }
}
