//! Session commands for a presentation layer.
//!
//! Every command works on the shared [`TrainerState`] and reports failures as
//! display strings, ready to hand to a UI.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::capture::autopilot::AutoPilot;
use crate::capture::pointer_lock::SoftwareLock;
use crate::capture::state::{ActiveSession, TrainerState};
use crate::error::TrainerError;
use crate::models::events::{InputEvent, SessionEvent};
use crate::models::session::{SessionOutcome, SessionSettings};
use crate::session::clock::TokioClock;
use crate::session::config::TrainerConfig;
use crate::session::observer::{ChannelObserver, EVENT_CHANNEL_CAPACITY};
use crate::session::runner::{spawn_session, DEFAULT_FRAME_PERIOD};
use crate::session::scheduler::{PhaseScheduler, SessionSnapshot};
use crate::telemetry::logger::LoggingObserver;

const MIN_FRAME_PERIOD_MS: u64 = 4;
const MAX_FRAME_PERIOD_MS: u64 = 100;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionOptions {
    /// Number or numeric string; garbage falls back to 800.
    pub dpi: Option<Value>,
    /// Number or numeric string; required.
    pub base_sensitivity: Option<Value>,
    /// Fixes candidate order and target placement.
    pub seed: Option<u64>,
    pub trainer: Option<TrainerConfig>,
    pub frame_period_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub capture_held: bool,
}

fn loose_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn sanitize_frame_period(ms: Option<u64>) -> Duration {
    match ms {
        Some(ms) => Duration::from_millis(ms.clamp(MIN_FRAME_PERIOD_MS, MAX_FRAME_PERIOD_MS)),
        None => DEFAULT_FRAME_PERIOD,
    }
}

fn settings_from_options(options: &StartSessionOptions) -> Result<SessionSettings, TrainerError> {
    let base = match &options.base_sensitivity {
        Some(Value::String(text)) => Some(
            text.trim()
                .parse::<f64>()
                .map_err(|_| TrainerError::InvalidBaseSensitivity(text.trim().to_string()))?,
        ),
        other => loose_number(other.as_ref()),
    };
    SessionSettings::from_loose(loose_number(options.dpi.as_ref()), base)
}

/// Starts a session and returns its id. Only one session may run at a time.
pub async fn start_session(
    state: &TrainerState,
    options: Option<StartSessionOptions>,
) -> Result<String, String> {
    let mut guard = state.0.lock().await;

    if guard.is_some() {
        return Err(TrainerError::SessionInProgress.into());
    }

    let options = options.unwrap_or_default();
    let settings = settings_from_options(&options)?;
    let config = options.trainer.clone().unwrap_or_default();
    let frame_period = sanitize_frame_period(options.frame_period_ms);
    let rng = StdRng::seed_from_u64(options.seed.unwrap_or_else(rand::random));

    let session_id = uuid::Uuid::new_v4().to_string();
    log::info!(
        "start_session: id={session_id} dpi={} base={} frame={}ms",
        settings.dpi,
        settings.base_sensitivity,
        frame_period.as_millis()
    );

    let lock = SoftwareLock::new();
    let capture = lock.handle();
    let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let mut scheduler = PhaseScheduler::new(config, settings, Box::new(lock), rng);
    scheduler.subscribe(Box::new(LoggingObserver::new(session_id.clone())));
    scheduler.subscribe(Box::new(ChannelObserver::new(event_tx)));

    let handle = spawn_session(scheduler, Arc::new(TokioClock::new()), frame_period);

    *guard = Some(ActiveSession {
        session_id: session_id.clone(),
        started_at: Utc::now(),
        handle,
        events,
        capture,
        frame_period,
    });

    Ok(session_id)
}

pub async fn send_input(
    state: &TrainerState,
    session_id: &str,
    input: InputEvent,
) -> Result<(), String> {
    let guard = state.0.lock().await;
    let active = guard.as_ref().ok_or(TrainerError::NoActiveSession)?;
    active.ensure_id(session_id)?;
    active.handle.send(input)?;
    Ok(())
}

/// Drains the events produced since the previous poll. Cursor and tracking
/// frame events are dropped while the queue is nearly full.
pub async fn poll_events(
    state: &TrainerState,
    session_id: &str,
) -> Result<Vec<SessionEvent>, String> {
    let mut guard = state.0.lock().await;
    let active = guard.as_mut().ok_or(TrainerError::NoActiveSession)?;
    active.ensure_id(session_id)?;

    let mut drained = Vec::new();
    while let Ok(event) = active.events.try_recv() {
        drained.push(event);
    }
    Ok(drained)
}

pub async fn session_status(state: &TrainerState, session_id: &str) -> Result<SessionStatus, String> {
    let guard = state.0.lock().await;
    let active = guard.as_ref().ok_or(TrainerError::NoActiveSession)?;
    active.ensure_id(session_id)?;

    Ok(SessionStatus {
        session_id: active.session_id.clone(),
        started_at: active.started_at,
        running: !active.handle.is_finished(),
        capture_held: active.capture.is_held(),
    })
}

/// Current phase, candidate, cursor and target of the running session.
pub async fn session_snapshot(
    state: &TrainerState,
    session_id: &str,
) -> Result<SessionSnapshot, String> {
    let guard = state.0.lock().await;
    let active = guard.as_ref().ok_or(TrainerError::NoActiveSession)?;
    active.ensure_id(session_id)?;
    Ok(active.handle.snapshot().await?)
}

/// Cancels the session, releases capture and clears the state.
pub async fn abort_session(state: &TrainerState, session_id: &str) -> Result<(), String> {
    let mut active = take_session(state, session_id).await?;
    log::info!("abort_session: id={session_id}");

    active.handle.abort();
    match active.handle.finish().await {
        Ok(_) => {}
        Err(err) => log::warn!("abort_session: {err}"),
    }
    Ok(())
}

/// Collects the outcome of a session whose task has ended and clears the
/// state. A session that is still running, or stalled, is left in place.
pub async fn finish_session(state: &TrainerState, session_id: &str) -> Result<SessionOutcome, String> {
    let active = {
        let mut guard = state.0.lock().await;
        let active = guard.as_ref().ok_or(TrainerError::NoActiveSession)?;
        active.ensure_id(session_id)?;
        if !active.handle.is_finished() {
            return Err(TrainerError::SessionRunning.into());
        }
        guard.take().ok_or(TrainerError::NoActiveSession)?
    };
    log::info!("finish_session: id={session_id}");

    let outcome = active.handle.finish().await?.ok_or(TrainerError::NoOutcome)?;
    log::info!(
        "finish_session: best={} after {}s",
        outcome.best_sensitivity,
        (outcome.completed_at - active.started_at).num_seconds()
    );
    Ok(outcome)
}

/// Returns a finished session to setup and starts another run with the same
/// settings, id and event queue.
pub async fn restart_session(state: &TrainerState, session_id: &str) -> Result<(), String> {
    let mut guard = state.0.lock().await;
    {
        let active = guard.as_ref().ok_or(TrainerError::NoActiveSession)?;
        active.ensure_id(session_id)?;
        if !active.handle.is_finished() {
            return Err(TrainerError::SessionRunning.into());
        }
    }
    let ActiveSession {
        session_id,
        handle,
        events,
        capture,
        frame_period,
        ..
    } = guard.take().ok_or(TrainerError::NoActiveSession)?;

    let mut exit = handle.join().await?;
    exit.scheduler.restart()?;
    log::info!("restart_session: id={session_id}");

    let handle = spawn_session(exit.scheduler, Arc::new(TokioClock::new()), frame_period);
    *guard = Some(ActiveSession {
        session_id,
        started_at: Utc::now(),
        handle,
        events,
        capture,
        frame_period,
    });
    Ok(())
}

async fn take_session(state: &TrainerState, session_id: &str) -> Result<ActiveSession, String> {
    let mut guard = state.0.lock().await;
    let active = guard.take().ok_or(TrainerError::NoActiveSession)?;

    if let Err(err) = active.ensure_id(session_id) {
        *guard = Some(active);
        return Err(err.into());
    }
    Ok(active)
}

/// Plays a started session with the synthetic player through the command
/// surface, polling every `poll_period`.
pub async fn autoplay_session(
    state: &TrainerState,
    session_id: &str,
    mut pilot: AutoPilot,
    poll_period: Duration,
) -> Result<SessionOutcome, String> {
    play_until_stopped(state, session_id, &mut pilot, poll_period).await?;
    finish_session(state, session_id).await
}

/// Feeds the player until the session task has returned. A stalled session
/// is aborted.
async fn play_until_stopped(
    state: &TrainerState,
    session_id: &str,
    pilot: &mut AutoPilot,
    poll_period: Duration,
) -> Result<(), String> {
    loop {
        let events = poll_events(state, session_id).await?;

        for event in &events {
            for planned in pilot.react(event) {
                if planned.delay_ms > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(planned.delay_ms / 1_000.0)).await;
                }
                if let Err(err) = send_input(state, session_id, planned.input).await {
                    // Frames queued ahead of `finished` can outlive the task.
                    if session_status(state, session_id).await?.running {
                        return Err(err);
                    }
                    return Ok(());
                }
            }

            if let SessionEvent::Stalled { reason } = event {
                log::warn!("autoplay_session: stalled: {reason}");
                abort_session(state, session_id).await?;
                return Err(format!("Session stalled: {reason}"));
            }
        }

        if !session_status(state, session_id).await?.running {
            return Ok(());
        }
        if events.is_empty() {
            tokio::time::sleep(poll_period).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::models::events::Phase;

    fn options(dpi: Value, sensitivity: Value) -> Option<StartSessionOptions> {
        Some(StartSessionOptions {
            dpi: Some(dpi),
            base_sensitivity: Some(sensitivity),
            seed: Some(7),
            ..StartSessionOptions::default()
        })
    }

    #[test]
    fn loose_numbers_accept_numbers_and_numeric_text() {
        assert_eq!(loose_number(Some(&json!(1600))), Some(1600.0));
        assert_eq!(loose_number(Some(&json!(" 2.5 "))), Some(2.5));
        assert_eq!(loose_number(Some(&json!("fast"))), None);
        assert_eq!(loose_number(Some(&json!(null))), None);
        assert_eq!(loose_number(None), None);
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let options: StartSessionOptions = serde_json::from_value(json!({
            "dpi": "1600",
            "baseSensitivity": 1.2,
            "seed": 3,
            "framePeriodMs": 8,
            "trainer": { "trackingDurationMs": 2000.0 }
        }))
        .unwrap();

        let settings = settings_from_options(&options).unwrap();
        assert_eq!(settings.dpi, 1600);
        assert_eq!(settings.base_sensitivity, 1.2);
        assert_eq!(sanitize_frame_period(options.frame_period_ms), Duration::from_millis(8));
        assert_eq!(options.trainer.unwrap().tracking_duration_ms, 2000.0);
    }

    #[test]
    fn text_sensitivity_must_parse() {
        let options = options(json!(800), json!("abc")).unwrap();
        assert!(matches!(
            settings_from_options(&options),
            Err(TrainerError::InvalidBaseSensitivity(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_sensitivity_without_starting() {
        let state = TrainerState::new();
        let err = start_session(&state, options(json!(800), json!(0))).await.unwrap_err();
        assert!(err.contains("Invalid base sensitivity"), "{err}");
        assert!(state.0.lock().await.is_none());

        let err = start_session(&state, None).await.unwrap_err();
        assert!(err.contains("missing"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_session_at_a_time() {
        let state = TrainerState::new();
        let id = start_session(&state, options(json!(800), json!(1.0))).await.unwrap();

        let err = start_session(&state, options(json!(800), json!(1.0))).await.unwrap_err();
        assert_eq!(err, "Session already in progress");

        abort_session(&state, &id).await.unwrap();
        assert!(state.0.lock().await.is_none());
        start_session(&state, options(json!(800), json!(1.0))).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_id_keeps_the_session() {
        let state = TrainerState::new();
        let id = start_session(&state, options(json!(800), json!(1.0))).await.unwrap();

        let err = abort_session(&state, "other").await.unwrap_err();
        assert!(err.contains("mismatch"), "{err}");
        assert!(send_input(&state, "other", InputEvent::Click).await.is_err());

        let status = session_status(&state, &id).await.unwrap();
        assert!(status.running);
        assert_eq!(status.session_id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_drained_by_polling() {
        let state = TrainerState::new();
        let id = start_session(&state, options(json!("abc"), json!("1.0"))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        let events = poll_events(&state, &id).await.unwrap();
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::PhaseChanged {
                phase: Phase::Accuracy,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::TargetSpawned { .. })));
        assert!(session_status(&state, &id).await.unwrap().capture_held);

        assert!(poll_events(&state, &id).await.unwrap().is_empty());

        send_input(&state, &id, InputEvent::CaptureLost).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!session_status(&state, &id).await.unwrap().capture_held);
        let events = poll_events(&state, &id).await.unwrap();
        assert!(events.contains(&SessionEvent::CaptureChanged { held: false }));

        abort_session(&state, &id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn commands_without_session_fail() {
        let state = TrainerState::new();
        assert_eq!(
            poll_events(&state, "x").await.unwrap_err(),
            "No active session"
        );
        assert!(finish_session(&state, "x").await.is_err());
        assert!(session_snapshot(&state, "x").await.is_err());
        assert!(restart_session(&state, "x").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn finish_leaves_a_running_session_abortable() {
        let state = TrainerState::new();
        let id = start_session(&state, options(json!(800), json!(1.0))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_100)).await;

        let err = finish_session(&state, &id).await.unwrap_err();
        assert_eq!(err, "Session is still running");
        assert!(session_status(&state, &id).await.unwrap().running);

        abort_session(&state, &id).await.unwrap();
        assert!(state.0.lock().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_shows_the_first_target() {
        let state = TrainerState::new();
        let id = start_session(&state, options(json!(800), json!(1.0))).await.unwrap();

        let snapshot = session_snapshot(&state, &id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Countdown);
        assert!(snapshot.target.is_none());

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        let snapshot = session_snapshot(&state, &id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Accuracy);
        assert_eq!(snapshot.candidate_index, 0);
        assert_eq!(snapshot.candidate_total, 5);
        assert_eq!(snapshot.targets_hit, 0);
        assert!(snapshot.target.is_some());
        assert!(snapshot.capture_held);

        assert!(session_snapshot(&state, "other").await.is_err());
        abort_session(&state, &id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_runs_the_same_session_again() {
        let state = TrainerState::new();
        let trainer = TrainerConfig {
            targets_per_round: 2,
            tracking_duration_ms: 1_000.0,
            ..TrainerConfig::default()
        };
        let id = start_session(
            &state,
            Some(StartSessionOptions {
                trainer: Some(trainer),
                ..options(json!(800), json!(1.0)).unwrap()
            }),
        )
        .await
        .unwrap();

        let err = restart_session(&state, &id).await.unwrap_err();
        assert_eq!(err, "Session is still running");

        let mut pilot = AutoPilot::new(800, 1.0);
        play_until_stopped(&state, &id, &mut pilot, Duration::from_millis(8))
            .await
            .unwrap();
        poll_events(&state, &id).await.unwrap();

        restart_session(&state, &id).await.unwrap();
        let status = session_status(&state, &id).await.unwrap();
        assert!(status.running);
        assert_eq!(status.session_id, id);

        let events = poll_events(&state, &id).await.unwrap();
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::PhaseChanged {
                phase: Phase::Setup,
                ..
            }
        )));
        let snapshot = session_snapshot(&state, &id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Countdown);
        assert_eq!(snapshot.completed, 0);

        abort_session(&state, &id).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_runs_a_session_to_its_outcome() {
        let state = TrainerState::new();
        let id = start_session(&state, options(json!(1600), json!(1.0))).await.unwrap();

        let outcome = autoplay_session(
            &state,
            &id,
            AutoPilot::new(1600, 1.0),
            Duration::from_millis(8),
        )
        .await
        .unwrap();

        assert_eq!(outcome.dpi, 1600);
        assert_eq!(outcome.all_results.len(), 5);
        assert!(state.0.lock().await.is_none());
    }
}
