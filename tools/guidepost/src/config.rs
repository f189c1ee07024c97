use crate::errors::GuidepostError;
use crate::logging::{DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::runtime::FileSystem;
use crate::types::RecorderMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub task_title: Option<String>,
    pub recorder: Option<RecorderMode>,
    pub log_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub task: TaskConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskConfig {
    pub title: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordingConfig {
    pub mode: RecorderMode,
    pub command: String,
    pub args: Vec<String>,
    /// Sent to the capture's stdin on shutdown; empty closes stdin instead.
    pub stop_input: String,
    pub stop_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptConfig {
    pub path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            task: TaskConfig {
                title: "Usability session".to_string(),
                instructions: "Complete the task your facilitator described, then come back here."
                    .to_string(),
            },
            recording: RecordingConfig {
                mode: RecorderMode::Process,
                command: "ffmpeg".to_string(),
                args: vec![
                    "-loglevel".to_string(),
                    "error".to_string(),
                    "-f".to_string(),
                    "x11grab".to_string(),
                    "-i".to_string(),
                    ":0".to_string(),
                    "-y".to_string(),
                    "session-recording.mp4".to_string(),
                ],
                stop_input: "q\n".to_string(),
                stop_grace_ms: 5000,
            },
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            },
            transcript: TranscriptConfig { path: None },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    task: Option<PartialTaskConfig>,
    recording: Option<PartialRecordingConfig>,
    logging: Option<PartialLoggingConfig>,
    transcript: Option<PartialTranscriptConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTaskConfig {
    title: Option<String>,
    instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRecordingConfig {
    mode: Option<RecorderMode>,
    command: Option<String>,
    args: Option<Vec<String>>,
    stop_input: Option<String>,
    stop_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    budget_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTranscriptConfig {
    path: Option<PathBuf>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, GuidepostError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| GuidepostError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(task) = partial.task {
        if let Some(title) = task.title {
            cfg.task.title = title;
        }
        if let Some(instructions) = task.instructions {
            cfg.task.instructions = instructions;
        }
    }

    if let Some(recording) = partial.recording {
        if let Some(mode) = recording.mode {
            cfg.recording.mode = mode;
        }
        if let Some(command) = recording.command {
            cfg.recording.command = command;
        }
        if let Some(args) = recording.args {
            cfg.recording.args = args;
        }
        if let Some(stop_input) = recording.stop_input {
            cfg.recording.stop_input = stop_input;
        }
        if let Some(value) = recording.stop_grace_ms {
            cfg.recording.stop_grace_ms = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = Some(path);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
    }

    if let Some(transcript) = partial.transcript {
        if let Some(path) = transcript.path {
            cfg.transcript.path = Some(path);
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(title) = &overrides.task_title {
        cfg.task.title = title.clone();
    }
    if let Some(mode) = overrides.recorder {
        cfg.recording.mode = mode;
    }
    if let Some(path) = &overrides.log_path {
        cfg.logging.path = Some(path.clone());
    }
    if let Some(path) = &overrides.transcript_path {
        cfg.transcript.path = Some(path.clone());
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), GuidepostError> {
    if cfg.task.title.trim().is_empty() {
        return Err(GuidepostError::InvalidConfig(
            "task.title must not be empty".to_string(),
        ));
    }

    if cfg.recording.mode == RecorderMode::Process && cfg.recording.command.trim().is_empty() {
        return Err(GuidepostError::InvalidConfig(
            "recording.command is required when recording.mode is \"process\"".to_string(),
        ));
    }

    if cfg.logging.max_payload_bytes == 0 {
        return Err(GuidepostError::InvalidConfig(
            "logging.max_payload_bytes must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

pub fn render_config(cfg: &AppConfig) -> Result<String, GuidepostError> {
    toml::to_string_pretty(cfg).map_err(|e| GuidepostError::ConfigParse(e.to_string()))
}
