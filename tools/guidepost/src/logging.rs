use crate::errors::GuidepostError;
use crate::log_retention::enforce_total_budget;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), GuidepostError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| GuidepostError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| GuidepostError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GuidepostError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| GuidepostError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| GuidepostError::Io(e.to_string()))?;

        enforce_total_budget(&self.path, self.budget_bytes)?;

        Ok(())
    }
}

static RUN_LOGGER: OnceLock<Mutex<Option<JsonlLogger>>> = OnceLock::new();

fn logger_slot() -> &'static Mutex<Option<JsonlLogger>> {
    RUN_LOGGER.get_or_init(|| Mutex::new(None))
}

/// Installs the process-wide run log. Later calls replace the target.
pub fn init_run_logger(logger: JsonlLogger) {
    if let Ok(mut slot) = logger_slot().lock() {
        *slot = Some(logger);
    }
}

pub fn clear_run_logger() {
    if let Ok(mut slot) = logger_slot().lock() {
        *slot = None;
    }
}

/// Appends to the run log if one is installed. Logging failures are dropped.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let logger = match logger_slot().lock() {
        Ok(slot) => slot.clone(),
        Err(_) => None,
    };
    if let Some(logger) = logger {
        let _ = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

pub fn structured_fallback_line(step: &str, event: &str, message: &str) -> String {
    format!(
        "step={step} event={event} message={} ",
        message.replace('\n', "\\n")
    )
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{
        append_run_log, clear_run_logger, init_run_logger, structured_fallback_line,
        truncate_json, JsonlLogger, LogEvent,
    };
    use serde_json::json;

    #[test]
    fn logger_truncates_large_payloads_and_writes_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 20;
        logger.budget_bytes = 1024;

        logger
            .append(&LogEvent {
                level: "info",
                event_type: "wizard.transition",
                payload: json!({"answer": "abcdefghijklmnopqrstuvwxyz"}),
            })
            .expect("append");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"event_type\":\"wizard.transition\""));
        assert!(text.contains("..."));
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let value = truncate_json(json!({"answer": "ééééééééééééééé"}), 16);
        let text = value.as_str().expect("string");
        assert!(text.ends_with("..."));
        assert!(text.len() <= 16);
    }

    #[test]
    fn fallback_line_is_deterministic() {
        let line = structured_fallback_line("q3_confusing", "advance", "hello\nworld");
        assert_eq!(line, "step=q3_confusing event=advance message=hello\\nworld ");
    }

    #[test]
    fn run_logger_stops_writing_once_cleared() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.jsonl");
        init_run_logger(JsonlLogger::new(&path));
        append_run_log("info", "logging_test.installed", json!({"n": 1}));
        clear_run_logger();
        append_run_log("info", "logging_test.cleared", json!({"n": 2}));

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("logging_test.installed"));
        assert!(!text.contains("logging_test.cleared"));
    }

    #[test]
    fn budget_never_touches_files_the_logger_did_not_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let notes = dir.path().join("participant-notes.txt");
        let recording = dir.path().join("session-recording.mp4");
        std::fs::write(&notes, vec![b'x'; 200]).expect("notes");
        std::fs::write(&recording, vec![0u8; 200]).expect("recording");
        std::fs::write(dir.path().join("run-previous.jsonl"), vec![b'{'; 200]).expect("old log");

        let mut logger = JsonlLogger::new(dir.path().join("run.jsonl"));
        logger.budget_bytes = 100;
        logger
            .append(&LogEvent {
                level: "info",
                event_type: "session.started",
                payload: json!({}),
            })
            .expect("append");

        assert!(notes.exists());
        assert!(recording.exists());
        assert!(!dir.path().join("run-previous.jsonl").exists());
        assert!(dir.path().join("run.jsonl").exists());
    }
}
