//! The wizard controller: the only writer of [`WizardState`].
//!
//! Every host event goes through [`WizardController::handle`], which applies
//! it synchronously and reports what happened as an [`Outcome`]. Wizard-level
//! problems (missing answers, failed recording starts, missing callbacks)
//! never surface as errors; they either block the offending transition or are
//! logged and absorbed.

use crate::draft::{ResponseDraft, ValidationErrors};
use crate::fsm::WizardState;
use crate::logging::append_run_log;
use crate::recording::{ActiveEdge, RecordingEngine, RecordingSignal};
use crate::steps::{spec_for, step_for_field};
use crate::submission::Submission;
use crate::types::{Field, Step, TaskSuccess, MAX_DIFFICULTY, MIN_DIFFICULTY};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub type RecordingObservedCallback = Box<dyn FnMut() + Send>;
pub type SubmitCallback = Box<dyn FnMut(&Submission) + Send>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WizardEvent {
    Advance,
    StartTask,
    FinishTask,
    ReopenPanel,
    Reshare,
    SelectTaskSuccess(TaskSuccess),
    SelectDifficulty(u8),
    EditConfusing(String),
    EditWorkedWell(String),
    Recording(RecordingSignal),
    Submitting(bool),
}

impl WizardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::StartTask => "start_task",
            Self::FinishTask => "finish_task",
            Self::ReopenPanel => "reopen_panel",
            Self::Reshare => "reshare",
            Self::SelectTaskSuccess(_) => "select_task_success",
            Self::SelectDifficulty(_) => "select_difficulty",
            Self::EditConfusing(_) => "edit_confusing",
            Self::EditWorkedWell(_) => "edit_worked_well",
            Self::Recording(_) => "recording",
            Self::Submitting(_) => "submitting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Moved { from: Step, to: Step },
    Updated,
    Blocked(Field),
    RecordingRequested,
    Submitted,
    Ignored,
}

pub struct WizardController {
    state: WizardState,
    draft: ResponseDraft,
    errors: ValidationErrors,
    signal: RecordingSignal,
    recording_edge: ActiveEdge,
    is_submitting: bool,
    submitted: bool,
    engine: Arc<dyn RecordingEngine>,
    on_recording_observed: Option<RecordingObservedCallback>,
    on_submit: Option<SubmitCallback>,
}

impl WizardController {
    pub fn new(engine: Arc<dyn RecordingEngine>) -> Self {
        Self {
            state: WizardState::default(),
            draft: ResponseDraft::default(),
            errors: ValidationErrors::default(),
            signal: RecordingSignal::default(),
            recording_edge: ActiveEdge::default(),
            is_submitting: false,
            submitted: false,
            engine,
            on_recording_observed: None,
            on_submit: None,
        }
    }

    pub fn with_on_submit(mut self, callback: impl FnMut(&Submission) + Send + 'static) -> Self {
        self.on_submit = Some(Box::new(callback));
        self
    }

    pub fn with_on_recording_observed(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_recording_observed = Some(Box::new(callback));
        self
    }

    pub fn set_on_submit(&mut self, callback: Option<SubmitCallback>) {
        self.on_submit = callback;
    }

    pub fn set_on_recording_observed(&mut self, callback: Option<RecordingObservedCallback>) {
        self.on_recording_observed = callback;
    }

    /// Entering the welcome step asks the recorder to start.
    pub fn mount(&mut self) -> Outcome {
        self.request_recording_start()
    }

    /// Host-driven restart: back to a freshly mounted wizard.
    pub fn reset(&mut self) -> Outcome {
        self.state = WizardState::default();
        self.draft = ResponseDraft::default();
        self.errors.clear_all();
        self.submitted = false;
        append_run_log("info", "wizard.reset", json!({}));
        self.mount()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn draft(&self) -> &ResponseDraft {
        &self.draft
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn signal(&self) -> &RecordingSignal {
        &self.signal
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn has_submitted(&self) -> bool {
        self.submitted
    }

    /// Whether the forward control is enabled for the displayed step.
    pub fn can_advance(&self) -> bool {
        match self.state.step {
            Step::Welcome => self.signal.active,
            Step::TaskBrief => false,
            _ => !self.is_submitting && !self.submitted,
        }
    }

    pub fn handle(&mut self, event: WizardEvent) -> Outcome {
        match event {
            WizardEvent::Advance => self.advance(),
            WizardEvent::StartTask => self.start_task(),
            WizardEvent::FinishTask => self.finish_task(),
            WizardEvent::ReopenPanel => {
                if self.state.reopen() {
                    Outcome::Updated
                } else {
                    Outcome::Ignored
                }
            }
            WizardEvent::Reshare => self.request_recording_start(),
            WizardEvent::SelectTaskSuccess(value) => {
                self.edit(Field::TaskSuccess, |draft| draft.task_success = Some(value))
            }
            WizardEvent::SelectDifficulty(value) => {
                if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&value) {
                    return Outcome::Ignored;
                }
                self.edit(Field::Difficulty, |draft| draft.difficulty = Some(value))
            }
            WizardEvent::EditConfusing(text) => {
                self.edit(Field::Confusing, |draft| draft.confusing = text)
            }
            WizardEvent::EditWorkedWell(text) => {
                self.edit(Field::WorkedWell, |draft| draft.worked_well = text)
            }
            WizardEvent::Recording(signal) => self.observe_recording(signal),
            WizardEvent::Submitting(flag) => {
                self.is_submitting = flag;
                Outcome::Updated
            }
        }
    }

    fn advance(&mut self) -> Outcome {
        let step = self.state.step;
        match step {
            Step::Welcome => {
                if !self.signal.active {
                    return Outcome::Ignored;
                }
                self.move_to(Step::TaskBrief)
            }
            Step::TaskBrief => Outcome::Ignored,
            _ => {
                if self.is_submitting || self.submitted {
                    return Outcome::Ignored;
                }
                let spec = spec_for(step);
                if let Some((field, message)) = spec.error_if_invalid(&self.draft) {
                    self.errors.set(field, message);
                    append_run_log(
                        "info",
                        "wizard.validation_failed",
                        json!({"step": step.as_str(), "field": field.as_str(), "message": message}),
                    );
                    return Outcome::Blocked(field);
                }
                if let Some(rule) = spec.rule {
                    self.errors.clear(rule.field);
                }
                if step.is_final() {
                    return self.submit();
                }
                match step.next() {
                    Some(next) => self.move_to(next),
                    None => Outcome::Ignored,
                }
            }
        }
    }

    fn move_to(&mut self, next: Step) -> Outcome {
        let from = self.state.step;
        if let Err(error) = self.state.transition(next) {
            append_run_log(
                "error",
                "wizard.transition_rejected",
                json!({"error": error.to_string()}),
            );
            return Outcome::Ignored;
        }
        append_run_log(
            "info",
            "wizard.transition",
            json!({"from": from.as_str(), "to": next.as_str()}),
        );
        Outcome::Moved { from, to: next }
    }

    fn start_task(&mut self) -> Outcome {
        if self.state.start_task().is_err() {
            return Outcome::Ignored;
        }
        append_run_log("info", "wizard.task_started", json!({}));
        Outcome::Updated
    }

    fn finish_task(&mut self) -> Outcome {
        if self.state.step != Step::TaskBrief {
            return Outcome::Ignored;
        }
        let from = self.state.step;
        match self.state.finish_task() {
            Ok(()) => {
                append_run_log(
                    "info",
                    "wizard.transition",
                    json!({"from": from.as_str(), "to": self.state.step.as_str()}),
                );
                Outcome::Moved {
                    from,
                    to: self.state.step,
                }
            }
            Err(_) => Outcome::Ignored,
        }
    }

    fn edit(&mut self, field: Field, apply: impl FnOnce(&mut ResponseDraft)) -> Outcome {
        if self.submitted || self.state.step != step_for_field(field) {
            return Outcome::Ignored;
        }
        apply(&mut self.draft);
        self.errors.clear(field);
        Outcome::Updated
    }

    fn submit(&mut self) -> Outcome {
        let Some(submission) = Submission::from_draft(&self.draft) else {
            append_run_log(
                "warn",
                "wizard.submit_incomplete",
                json!({"step": self.state.step.as_str()}),
            );
            return Outcome::Ignored;
        };
        self.submitted = true;
        append_run_log(
            "info",
            "wizard.submitted",
            json!({"entries": submission.entries().len()}),
        );
        if let Some(callback) = self.on_submit.as_mut() {
            callback(&submission);
        }
        Outcome::Submitted
    }

    fn request_recording_start(&mut self) -> Outcome {
        self.state.recording_requested = true;
        if let Err(error) = self.engine.request_start() {
            append_run_log(
                "warn",
                "recording.request_failed",
                json!({"step": self.state.step.as_str(), "error": error.to_string()}),
            );
        }
        Outcome::RecordingRequested
    }

    fn observe_recording(&mut self, signal: RecordingSignal) -> Outcome {
        let rose = self.recording_edge.observe(signal.active);
        self.signal = signal;
        if rose {
            append_run_log(
                "info",
                "recording.observed",
                json!({"step": self.state.step.as_str()}),
            );
            if let Some(callback) = self.on_recording_observed.as_mut() {
                callback();
            }
        }
        Outcome::Updated
    }
}
