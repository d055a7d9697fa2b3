pub mod algorithm;
pub mod capture;
pub mod commands;
pub mod error;
pub mod models;
pub mod session;
pub mod telemetry;

use std::time::Duration;

use clap::Parser;
use serde_json::json;

use algorithm::scoring::ranked;
use capture::autopilot::AutoPilot;
use capture::state::TrainerState;
use commands::session::{autoplay_session, start_session, StartSessionOptions};
use models::session::SessionSettings;

/// Runs a full sensitivity session with a synthetic player and prints the
/// outcome as JSON. A session takes about a minute of wall time.
#[derive(Debug, Parser)]
#[command(name = "sensfinder")]
#[command(about = "Rank candidate mouse sensitivities around a base value")]
struct Cli {
    /// Mouse DPI; anything unusable falls back to 800.
    #[arg(long, default_value = "800")]
    dpi: String,

    /// In-game sensitivity the candidates are derived from.
    #[arg(long)]
    sensitivity: String,

    /// Sensitivity the synthetic hand is used to. Defaults to the base.
    #[arg(long)]
    preferred: Option<f64>,

    /// Fixes candidate order and target placement.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long = "frame-ms", default_value_t = 16)]
    frame_ms: u64,

    #[arg(long, default_value_t = 16)]
    poll_ms: u64,
}

pub fn run() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run_cli(cli) {
        log::error!("run: {err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<(), String> {
    let settings = SessionSettings::from_raw(&cli.dpi, &cli.sensitivity)?;
    let preferred = cli.preferred.unwrap_or(settings.base_sensitivity);
    log::info!(
        "run_cli: dpi={} base={} preferred={preferred}",
        settings.dpi,
        settings.base_sensitivity
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {e}"))?;

    runtime.block_on(async {
        let state = TrainerState::new();
        let options = StartSessionOptions {
            dpi: Some(json!(settings.dpi)),
            base_sensitivity: Some(json!(settings.base_sensitivity)),
            seed: cli.seed,
            frame_period_ms: Some(cli.frame_ms),
            ..StartSessionOptions::default()
        };
        let session_id = start_session(&state, Some(options)).await?;

        let pilot = AutoPilot::new(settings.dpi, preferred);
        let outcome = autoplay_session(
            &state,
            &session_id,
            pilot,
            Duration::from_millis(cli.poll_ms.max(1)),
        )
        .await?;

        let report = json!({
            "sessionId": session_id,
            "outcome": &outcome,
            "ranking": ranked(&outcome.all_results),
        });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize outcome: {e}"))?;
        println!("{text}");
        Ok(())
    })
}
