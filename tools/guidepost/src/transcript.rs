//! Session transcripts and deterministic replay.
//!
//! A transcript is a JSONL file with one [`TranscriptEntry`] per line. Every
//! event the host fed the controller, recording signals included, is kept in
//! order, so replaying the file against a fresh controller reproduces the
//! final wizard state without a recorder or a participant.

use crate::controller::{Outcome, WizardController, WizardEvent};
use crate::draft::{ResponseDraft, ValidationErrors};
use crate::errors::GuidepostError;
use crate::fsm::WizardState;
use crate::recording::InertRecordingEngine;
use crate::submission::Submission;
use crate::types::Step;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    SessionStart(SessionStartRecord),
    Event(EventRecord),
    Submitted(SubmittedRecord),
    SessionEnd(SessionEndRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartRecord {
    pub task_title: String,
    pub recorded_at_unix_ns: u64,
    pub guidepost_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    /// Step displayed when the event arrived.
    pub step: Step,
    pub event: WizardEvent,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedRecord {
    pub responses: Submission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEndRecord {
    pub submitted: bool,
    pub events: u64,
}

pub fn timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

pub fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Moved { from, to } => format!("moved:{}>{}", from.as_str(), to.as_str()),
        Outcome::Updated => "updated".to_string(),
        Outcome::Blocked(field) => format!("blocked:{}", field.as_str()),
        Outcome::RecordingRequested => "recording_requested".to_string(),
        Outcome::Submitted => "submitted".to_string(),
        Outcome::Ignored => "ignored".to_string(),
    }
}

#[derive(Debug)]
pub struct TranscriptWriter {
    path: PathBuf,
    next_seq: u64,
}

impl TranscriptWriter {
    pub fn create(path: impl AsRef<Path>, task_title: &str) -> Result<Self, GuidepostError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| GuidepostError::Io(e.to_string()))?;
        }
        fs::write(&path, "").map_err(|e| GuidepostError::Io(e.to_string()))?;
        let mut writer = Self { path, next_seq: 1 };
        writer.append(&TranscriptEntry::SessionStart(SessionStartRecord {
            task_title: task_title.to_string(),
            recorded_at_unix_ns: timestamp_ns(),
            guidepost_version: env!("CARGO_PKG_VERSION").to_string(),
        }))?;
        Ok(writer)
    }

    pub fn record_event(
        &mut self,
        step: Step,
        event: &WizardEvent,
        outcome: &Outcome,
    ) -> Result<(), GuidepostError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.append(&TranscriptEntry::Event(EventRecord {
            seq,
            step,
            event: event.clone(),
            outcome: outcome_label(outcome),
        }))
    }

    pub fn record_submission(&mut self, responses: &Submission) -> Result<(), GuidepostError> {
        self.append(&TranscriptEntry::Submitted(SubmittedRecord {
            responses: responses.clone(),
        }))
    }

    pub fn finish(mut self, submitted: bool) -> Result<(), GuidepostError> {
        let events = self.next_seq - 1;
        self.append(&TranscriptEntry::SessionEnd(SessionEndRecord { submitted, events }))
    }

    fn append(&mut self, entry: &TranscriptEntry) -> Result<(), GuidepostError> {
        let line =
            serde_json::to_string(entry).map_err(|e| GuidepostError::Transcript(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GuidepostError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| GuidepostError::Io(e.to_string()))
    }
}

pub fn parse_transcript(text: &str) -> Result<Vec<TranscriptEntry>, GuidepostError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                GuidepostError::Transcript(format!("line {}: {e}", idx + 1))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub task_title: Option<String>,
    pub state: WizardState,
    pub draft: ResponseDraft,
    pub errors: ValidationErrors,
    pub submission: Option<Submission>,
    pub events: usize,
}

pub fn replay_entries(entries: &[TranscriptEntry]) -> Result<ReplaySummary, GuidepostError> {
    let produced: Arc<Mutex<Option<Submission>>> = Arc::new(Mutex::new(None));
    let sink = produced.clone();
    let mut controller = WizardController::new(Arc::new(InertRecordingEngine::default()))
        .with_on_submit(move |submission: &Submission| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(submission.clone());
            }
        });
    controller.mount();

    let mut task_title = None;
    let mut recorded_submission = None;
    let mut events = 0usize;
    for entry in entries {
        match entry {
            TranscriptEntry::SessionStart(start) => task_title = Some(start.task_title.clone()),
            TranscriptEntry::Event(record) => {
                if controller.step() != record.step {
                    return Err(GuidepostError::Transcript(format!(
                        "event {} expected step {} but replay is at {}",
                        record.seq,
                        record.step.as_str(),
                        controller.step().as_str()
                    )));
                }
                controller.handle(record.event.clone());
                events += 1;
            }
            TranscriptEntry::Submitted(record) => {
                recorded_submission = Some(record.responses.clone())
            }
            TranscriptEntry::SessionEnd(_) => {}
        }
    }

    let submission = produced
        .lock()
        .map_err(|_| GuidepostError::Transcript("replay sink poisoned".to_string()))?
        .clone();
    if recorded_submission.is_some() && recorded_submission != submission {
        return Err(GuidepostError::Transcript(
            "replayed submission differs from the recorded one".to_string(),
        ));
    }

    Ok(ReplaySummary {
        task_title,
        state: *controller.state(),
        draft: controller.draft().clone(),
        errors: controller.errors().clone(),
        submission,
        events,
    })
}

pub fn replay_transcript(path: &Path) -> Result<ReplaySummary, GuidepostError> {
    let text = fs::read_to_string(path).map_err(|e| GuidepostError::Io(e.to_string()))?;
    replay_entries(&parse_transcript(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingSignal;
    use crate::types::{Field, TaskSuccess};

    fn event(seq: u64, step: Step, event: WizardEvent) -> TranscriptEntry {
        TranscriptEntry::Event(EventRecord {
            seq,
            step,
            event,
            outcome: String::new(),
        })
    }

    #[test]
    fn replay_reproduces_blocked_state() {
        let entries = vec![
            event(1, Step::Welcome, WizardEvent::Advance),
            event(2, Step::Welcome, WizardEvent::Recording(RecordingSignal::active())),
            event(3, Step::Welcome, WizardEvent::Advance),
            event(4, Step::TaskBrief, WizardEvent::FinishTask),
            event(5, Step::Q1TaskSuccess, WizardEvent::Advance),
        ];
        let summary = replay_entries(&entries).expect("replay");
        assert_eq!(summary.state.step, Step::Q1TaskSuccess);
        assert_eq!(summary.errors.get(Field::TaskSuccess), Some("Please select an option"));
        assert_eq!(summary.events, 5);
        assert!(summary.submission.is_none());
    }

    #[test]
    fn replay_rejects_transcripts_that_drift() {
        let entries = vec![
            event(1, Step::Welcome, WizardEvent::Advance),
            event(2, Step::TaskBrief, WizardEvent::FinishTask),
        ];
        let err = replay_entries(&entries).expect_err("drift");
        assert!(matches!(err, GuidepostError::Transcript(message) if message.contains("event 2")));
    }

    #[test]
    fn writer_output_replays_to_the_same_submission() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.transcript.jsonl");
        let mut writer = TranscriptWriter::create(&path, "Checkout flow").expect("create");
        let script = [
            (Step::Welcome, WizardEvent::Recording(RecordingSignal::active())),
            (Step::Welcome, WizardEvent::Advance),
            (Step::TaskBrief, WizardEvent::StartTask),
            (Step::TaskBrief, WizardEvent::FinishTask),
            (Step::Q1TaskSuccess, WizardEvent::SelectTaskSuccess(TaskSuccess::Partially)),
            (Step::Q1TaskSuccess, WizardEvent::Advance),
            (Step::Q2Difficulty, WizardEvent::SelectDifficulty(3)),
            (Step::Q2Difficulty, WizardEvent::Advance),
            (Step::Q3Confusing, WizardEvent::EditConfusing("nothing".to_string())),
            (Step::Q3Confusing, WizardEvent::Advance),
            (Step::Q4WorkedWell, WizardEvent::EditWorkedWell("layout".to_string())),
            (Step::Q4WorkedWell, WizardEvent::Advance),
        ];
        for (step, event) in &script {
            writer.record_event(*step, event, &Outcome::Updated).expect("record");
        }
        let expected = Submission::from_draft(&ResponseDraft {
            task_success: Some(TaskSuccess::Partially),
            difficulty: Some(3),
            confusing: "nothing".to_string(),
            worked_well: "layout".to_string(),
        })
        .expect("complete");
        writer.record_submission(&expected).expect("submission");
        writer.finish(true).expect("finish");

        let summary = replay_transcript(&path).expect("replay");
        assert_eq!(summary.task_title.as_deref(), Some("Checkout flow"));
        assert_eq!(summary.submission, Some(expected));
        assert_eq!(summary.events, script.len());
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let err = parse_transcript("{\"type\":\"session_end\",\"submitted\":false,\"events\":0}\nnot json")
            .expect_err("bad line");
        assert!(matches!(err, GuidepostError::Transcript(message) if message.starts_with("line 2")));
    }
}
