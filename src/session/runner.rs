//! Drives a [`PhaseScheduler`] on the tokio runtime.
//!
//! One task owns the scheduler and multiplexes four sources: the cancel
//! signal, host commands, the pending phase deadline and the frame interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::TrainerError;
use crate::models::events::{InputEvent, Phase};
use crate::models::session::SessionOutcome;
use crate::session::clock::Clock;
use crate::session::scheduler::{PhaseScheduler, SessionSnapshot};

/// Default animation frame period (~60 Hz).
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Requests the host can make of a running session.
#[derive(Debug)]
pub enum SessionCommand {
    Input(InputEvent),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// What a session task hands back when it stops.
pub struct SessionExit {
    /// Finished or aborted scheduler, ready for `restart`.
    pub scheduler: PhaseScheduler,
    /// `None` when the session was cancelled.
    pub outcome: Option<SessionOutcome>,
}

/// Runs one session to completion.
///
/// The outcome is `None` when the session was cancelled or its command
/// channel closed before the last candidate was scored; the scheduler is
/// aborted in both cases so pointer capture is released.
pub async fn run_session(
    mut scheduler: PhaseScheduler,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    mut cancel: oneshot::Receiver<()>,
    clock: Arc<dyn Clock>,
    frame_period: Duration,
) -> Result<SessionExit, TrainerError> {
    scheduler.start(clock.now_ms())?;

    let mut frames = tokio::time::interval(frame_period.max(Duration::from_millis(1)));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if scheduler.phase() == Phase::Finished {
            log::info!("run_session: finished with {} results", scheduler.results().len());
            let outcome = scheduler.outcome();
            return Ok(SessionExit { scheduler, outcome });
        }

        let deadline = scheduler.next_deadline();
        let wake_at = deadline.map(|deadline| instant_for(deadline, clock.as_ref()));
        let frame_loop = scheduler.frame_loop_active();

        tokio::select! {
            biased;

            _ = &mut cancel => {
                log::info!("run_session: cancelled in phase {:?}", scheduler.phase());
                scheduler.abort();
                return Ok(SessionExit { scheduler, outcome: None });
            }

            command = commands.recv() => match command {
                Some(SessionCommand::Input(event)) => scheduler.handle_input(event, clock.now_ms()),
                Some(SessionCommand::Snapshot(reply)) => {
                    reply.send(scheduler.snapshot(clock.now_ms())).ok();
                }
                None => {
                    log::info!("run_session: command channel closed in phase {:?}", scheduler.phase());
                    scheduler.abort();
                    return Ok(SessionExit { scheduler, outcome: None });
                }
            },

            _ = sleep_until(wake_at), if wake_at.is_some() => {
                // The timer fired, so the deadline counts as reached even if
                // the clock lags by rounding.
                let now = clock.now_ms().max(deadline.unwrap_or_default());
                scheduler.advance(now);
            }

            _ = frames.tick(), if frame_loop => {
                scheduler.on_frame(clock.now_ms());
            }
        }
    }
}

fn instant_for(deadline_ms: f64, clock: &dyn Clock) -> Instant {
    let remaining_ms = (deadline_ms - clock.now_ms()).max(0.0);
    Instant::now() + Duration::from_secs_f64(remaining_ms / 1_000.0)
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn stopped() -> TrainerError {
    TrainerError::Runner("session task has stopped".to_string())
}

/// Host side of a spawned session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<SessionExit, TrainerError>>,
}

impl SessionHandle {
    pub fn send(&self, event: InputEvent) -> Result<(), TrainerError> {
        self.commands
            .send(SessionCommand::Input(event))
            .map_err(|_| stopped())
    }

    /// Current scheduler state, read by the session task between events.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, TrainerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot(reply))
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signals cancellation; the session task aborts at its next poll.
    pub fn abort(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.send(()).ok();
        }
    }

    /// Waits for the session task and takes back its scheduler.
    pub async fn join(self) -> Result<SessionExit, TrainerError> {
        let SessionHandle {
            commands,
            cancel,
            join,
        } = self;

        let result = join
            .await
            .map_err(|e| TrainerError::Runner(format!("session task failed: {e}")))?;
        drop(commands);
        drop(cancel);
        result
    }

    /// Waits for the session task and returns its outcome.
    pub async fn finish(self) -> Result<Option<SessionOutcome>, TrainerError> {
        Ok(self.join().await?.outcome)
    }
}

/// Spawns [`run_session`] onto the current runtime. Dropping the returned
/// handle cancels the session.
pub fn spawn_session(
    scheduler: PhaseScheduler,
    clock: Arc<dyn Clock>,
    frame_period: Duration,
) -> SessionHandle {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let (cancel, cancel_rx) = oneshot::channel();
    let join = tokio::spawn(run_session(
        scheduler,
        command_rx,
        cancel_rx,
        clock,
        frame_period,
    ));

    SessionHandle {
        commands,
        cancel: Some(cancel),
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::capture::autopilot::AutoPilot;
    use crate::capture::pointer_lock::{AlwaysHeld, SoftwareLock};
    use crate::models::events::SessionEvent;
    use crate::models::session::SessionSettings;
    use crate::session::clock::TokioClock;
    use crate::session::config::TrainerConfig;
    use crate::session::observer::{ChannelObserver, EVENT_CHANNEL_CAPACITY};

    fn scheduler(events: mpsc::Sender<SessionEvent>) -> PhaseScheduler {
        let settings = SessionSettings::from_loose(Some(800.0), Some(2.0)).unwrap();
        let mut scheduler = PhaseScheduler::new(
            TrainerConfig::default(),
            settings,
            Box::new(AlwaysHeld),
            StdRng::seed_from_u64(42),
        );
        scheduler.subscribe(Box::new(ChannelObserver::new(events)));
        scheduler
    }

    /// Feeds the player's inputs straight into the session task until it
    /// finishes or goes away.
    async fn drive(
        mut pilot: AutoPilot,
        mut events: mpsc::Receiver<SessionEvent>,
        commands: mpsc::UnboundedSender<SessionCommand>,
    ) {
        while let Some(event) = events.recv().await {
            for planned in pilot.react(&event) {
                if planned.delay_ms > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(planned.delay_ms / 1_000.0)).await;
                }
                if commands.send(SessionCommand::Input(planned.input)).is_err() {
                    return;
                }
            }
            if matches!(event, SessionEvent::Finished { .. }) {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn autopilot_completes_a_full_session() {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = spawn_session(
            scheduler(event_tx),
            Arc::new(TokioClock::new()),
            DEFAULT_FRAME_PERIOD,
        );
        let pilot = AutoPilot::new(800, 2.0);
        let driver = tokio::spawn(drive(pilot, event_rx, handle.commands.clone()));

        let mut exit = handle.join().await.unwrap();
        driver.await.unwrap();
        let outcome = exit.outcome.take().expect("session finished");

        assert_eq!(outcome.all_results.len(), 5);
        assert_eq!(outcome.dpi, 800);
        assert_eq!(outcome.base_sensitivity, 2.0);

        let mut evaluated: Vec<f64> = outcome.all_results.iter().map(|r| r.sensitivity).collect();
        evaluated.sort_by(f64::total_cmp);
        assert_eq!(evaluated, vec![1.5, 1.8, 2.0, 2.2, 2.5]);

        // A hand calibrated for 2.0 flies past targets at 2.5 and never
        // reverses at or below its own sensitivity.
        for result in &outcome.all_results {
            if result.sensitivity > 2.2 {
                assert!(result.overshoots > 0, "{result:?}");
            }
            if result.sensitivity <= 2.0 {
                assert_eq!(result.overshoots, 0, "{result:?}");
            }
            assert!(result.combined_score <= 100);
        }

        // The returned scheduler is parked on the result screen.
        assert_eq!(exit.scheduler.phase(), Phase::Finished);
        exit.scheduler.restart().unwrap();
        assert_eq!(exit.scheduler.phase(), Phase::Setup);
        assert!(exit.scheduler.results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_answered_by_the_running_task() {
        let (event_tx, _event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut handle = spawn_session(
            scheduler(event_tx),
            Arc::new(TokioClock::new()),
            DEFAULT_FRAME_PERIOD,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Countdown);
        assert_eq!(snapshot.countdown, 3);
        assert_eq!(snapshot.candidate_total, 5);

        handle.abort();
        let exit = handle.join().await.unwrap();
        assert!(exit.outcome.is_none());
        assert_eq!(exit.scheduler.phase(), Phase::Setup);
    }

    #[tokio::test(start_paused = true)]
    async fn session_waits_for_countdown_before_accuracy() {
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut handle = spawn_session(
            scheduler(event_tx),
            Arc::new(TokioClock::new()),
            DEFAULT_FRAME_PERIOD,
        );

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let mut phases = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            if let SessionEvent::PhaseChanged { phase, .. } = event {
                phases.push(phase);
            }
        }
        assert_eq!(phases, vec![Phase::Countdown]);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let mut started = false;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, SessionEvent::CandidateStarted { index: 0, .. }) {
                started = true;
            }
        }
        assert!(started);

        handle.abort();
        assert!(handle.finish().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_capture_and_returns_none() {
        let (event_tx, _event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let settings = SessionSettings::from_loose(Some(1600.0), Some(1.0)).unwrap();
        let lock = SoftwareLock::new();
        let lock_handle = lock.handle();
        let mut scheduler = PhaseScheduler::new(
            TrainerConfig::default(),
            settings,
            Box::new(lock),
            StdRng::seed_from_u64(3),
        );
        scheduler.subscribe(Box::new(ChannelObserver::new(event_tx)));

        let mut handle = spawn_session(scheduler, Arc::new(TokioClock::new()), DEFAULT_FRAME_PERIOD);
        tokio::time::sleep(Duration::from_millis(3_200)).await;
        assert!(lock_handle.is_held());

        handle.abort();
        assert!(handle.finish().await.unwrap().is_none());
        assert!(!lock_handle.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_aborts_the_session() {
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = spawn_session(
            scheduler(event_tx),
            Arc::new(TokioClock::new()),
            DEFAULT_FRAME_PERIOD,
        );
        drop(handle);

        let mut last_phase = None;
        while let Some(event) = event_rx.recv().await {
            if let SessionEvent::PhaseChanged { phase, .. } = event {
                last_phase = Some(phase);
            }
        }
        assert_eq!(last_phase, Some(Phase::Setup));
    }
}
