pub mod config;
pub mod controller;
pub mod draft;
pub mod errors;
pub mod fsm;
pub mod hotkeys;
pub mod log_retention;
pub mod logging;
pub mod output_envelope;
pub mod recording;
pub mod runtime;
pub mod session;
pub mod steps;
pub mod submission;
pub mod transcript;
pub mod tui;
pub mod types;

use clap::{error::ErrorKind, Parser, ValueEnum};
use config::{load_config, render_config, AppConfig, CliOverrides};
use errors::GuidepostError;
use logging::{init_run_logger, structured_fallback_line, JsonlLogger};
use output_envelope::render_envelope;
use recording::{ProcessRecordingEngine, RecordingEngine, SimulatedRecordingEngine};
use runtime::{ProcessRequest, ProductionRuntime};
use session::run_session;
use std::sync::Arc;
use std::time::Duration;
use transcript::replay_transcript;
use types::RecorderMode;

/// Exit code for a session that ended before the survey was submitted.
pub const EXIT_INCOMPLETE: i32 = 2;

#[derive(Debug, Clone, Parser)]
#[command(name = "guidepost")]
#[command(about = "Guided user-testing session: recording consent, task brief, and a four-question survey")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long)]
    pub task_title: Option<String>,
    #[arg(long, value_enum)]
    pub recorder: Option<CliRecorder>,
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,
    #[arg(long)]
    pub transcript: Option<std::path::PathBuf>,
    #[arg(long)]
    pub replay: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = false)]
    pub print_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliRecorder {
    Process,
    Simulated,
}

impl From<CliRecorder> for RecorderMode {
    fn from(value: CliRecorder) -> Self {
        match value {
            CliRecorder::Process => RecorderMode::Process,
            CliRecorder::Simulated => RecorderMode::Simulated,
        }
    }
}

pub fn run() -> Result<i32, GuidepostError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    runtime: &ProductionRuntime,
) -> Result<i32, GuidepostError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(GuidepostError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        task_title: cli.task_title.clone(),
        recorder: cli.recorder.map(Into::into),
        log_path: cli.log_path.clone(),
        transcript_path: cli.transcript.clone(),
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;

    if cli.print_config {
        runtime.terminal.write_line(&render_config(&cfg)?)?;
        return Ok(0);
    }

    if let Some(path) = &cfg.logging.path {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                runtime.file_system.create_dir_all(parent)?;
            }
        }
        let mut logger = JsonlLogger::new(path);
        logger.max_payload_bytes = cfg.logging.max_payload_bytes;
        logger.budget_bytes = cfg.logging.budget_bytes;
        init_run_logger(logger);
    }

    if let Some(path) = &cli.replay {
        return replay(runtime, &cfg, path);
    }

    let engine = build_engine(&cfg, runtime);
    let summary = run_session(&cfg, runtime.terminal.as_ref(), engine)?;
    if summary.submission.is_some() {
        return Ok(0);
    }
    runtime.terminal.write_line(&structured_fallback_line(
        "session",
        "incomplete",
        &format!("ended without submission after {} events", summary.events),
    ))?;
    Ok(EXIT_INCOMPLETE)
}

pub fn build_engine(cfg: &AppConfig, runtime: &ProductionRuntime) -> Arc<dyn RecordingEngine> {
    match cfg.recording.mode {
        RecorderMode::Simulated => Arc::new(SimulatedRecordingEngine::new()),
        RecorderMode::Process => Arc::new(
            ProcessRecordingEngine::new(
                runtime.process_runner.clone(),
                ProcessRequest {
                    program: cfg.recording.command.clone(),
                    args: cfg.recording.args.clone(),
                    cwd: None,
                    stop_input: Some(cfg.recording.stop_input.clone())
                        .filter(|input| !input.is_empty()),
                },
            )
            .with_stop_grace(Duration::from_millis(cfg.recording.stop_grace_ms)),
        ),
    }
}

fn replay(
    runtime: &ProductionRuntime,
    cfg: &AppConfig,
    path: &std::path::Path,
) -> Result<i32, GuidepostError> {
    let summary = replay_transcript(path)?;
    runtime.terminal.write_line(&structured_fallback_line(
        summary.state.step.as_str(),
        "replayed",
        &format!("events={} submitted={}", summary.events, summary.submission.is_some()),
    ))?;
    let Some(submission) = summary.submission else {
        return Ok(EXIT_INCOMPLETE);
    };
    let title = summary.task_title.unwrap_or_else(|| cfg.task.title.clone());
    runtime
        .terminal
        .write_line(&render_envelope(&title, &submission)?)?;
    Ok(0)
}
