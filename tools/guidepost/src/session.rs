use crate::config::AppConfig;
use crate::controller::{Outcome, WizardController, WizardEvent};
use crate::errors::GuidepostError;
use crate::hotkeys::{action_for_input, HotkeyAction};
use crate::logging::{append_run_log, structured_fallback_line};
use crate::output_envelope::render_envelope;
use crate::recording::{take_changed, RecordingEngine};
use crate::runtime::Terminal;
use crate::steps::spec_for;
use crate::submission::Submission;
use crate::transcript::{outcome_label, TranscriptWriter};
use crate::tui::{render_wizard, WizardView};
use crate::types::Step;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const FRAME_WIDTH: u16 = 100;
const FRAME_HEIGHT: u16 = 22;

/// Host-side session state. Owns the submission-in-flight flag the
/// controller reads as a level-triggered disable.
#[derive(Debug, Default)]
pub struct SessionContext {
    is_submitting: bool,
}

impl SessionContext {
    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn begin_submission(&mut self) -> WizardEvent {
        self.is_submitting = true;
        WizardEvent::Submitting(true)
    }

    pub fn finish_submission(&mut self) -> WizardEvent {
        self.is_submitting = false;
        WizardEvent::Submitting(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub submission: Option<Submission>,
    pub events: usize,
    pub recording_observed: usize,
}

struct SessionHost<'a> {
    cfg: &'a AppConfig,
    terminal: &'a dyn Terminal,
    controller: WizardController,
    transcript: Option<TranscriptWriter>,
    events: usize,
    last_prompt: Option<(Step, bool)>,
}

impl SessionHost<'_> {
    fn feed(&mut self, event: WizardEvent) -> Result<Outcome, GuidepostError> {
        let step = self.controller.step();
        let outcome = self.controller.handle(event.clone());
        self.events += 1;
        append_run_log(
            "debug",
            "session.event",
            json!({"step": step.as_str(), "event": event.name(), "outcome": outcome_label(&outcome)}),
        );
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.record_event(step, &event, &outcome)?;
        }
        if let Outcome::Blocked(field) = outcome {
            let message = self.controller.errors().get(field).unwrap_or_default().to_string();
            if !self.terminal.stdin_is_tty() {
                self.terminal.write_line(&structured_fallback_line(
                    step.as_str(),
                    "blocked",
                    &format!("{}: {message}", field.as_str()),
                ))?;
            }
        }
        Ok(outcome)
    }

    fn render(&mut self) -> Result<(), GuidepostError> {
        if self.terminal.stdin_is_tty() {
            let view = WizardView::from_controller(
                &self.controller,
                &self.cfg.task.title,
                &self.cfg.task.instructions,
            );
            let frame = render_wizard(&view, FRAME_WIDTH, FRAME_HEIGHT)?;
            return self.terminal.draw(&frame);
        }

        let prompt = (self.controller.step(), self.controller.state().visible);
        if self.last_prompt == Some(prompt) {
            return Ok(());
        }
        self.last_prompt = Some(prompt);
        let (step, visible) = prompt;
        let message = if visible {
            spec_for(step).title.to_string()
        } else {
            format!("panel collapsed while working on {}", self.cfg.task.title)
        };
        self.terminal
            .write_line(&structured_fallback_line(step.as_str(), "prompt", &message))
    }
}

pub fn run_session(
    cfg: &AppConfig,
    terminal: &dyn Terminal,
    engine: Arc<dyn RecordingEngine>,
) -> Result<SessionSummary, GuidepostError> {
    let produced: Arc<Mutex<Option<Submission>>> = Arc::new(Mutex::new(None));
    let observed = Arc::new(AtomicUsize::new(0));
    let sink = produced.clone();
    let observed_counter = observed.clone();
    let controller = WizardController::new(engine.clone())
        .with_on_submit(move |submission: &Submission| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(submission.clone());
            }
        })
        .with_on_recording_observed(move || {
            observed_counter.fetch_add(1, Ordering::SeqCst);
        });

    let transcript = match &cfg.transcript.path {
        Some(path) => Some(TranscriptWriter::create(path, &cfg.task.title)?),
        None => None,
    };

    let mut host = SessionHost {
        cfg,
        terminal,
        controller,
        transcript,
        events: 0,
        last_prompt: None,
    };
    let mut signals = engine.subscribe();
    let mut session = SessionContext::default();
    let mut announced = 0usize;
    let mut submission = None;

    append_run_log(
        "info",
        "session.started",
        json!({"task_title": cfg.task.title, "recorder": cfg.recording.mode.as_str()}),
    );
    host.controller.mount();

    loop {
        if let Err(error) = engine.poll() {
            append_run_log("warn", "recording.poll_failed", json!({"error": error.to_string()}));
        }
        if let Some(signal) = take_changed(&mut signals) {
            if signal.error.is_some() && !terminal.stdin_is_tty() {
                terminal.write_line(&structured_fallback_line(
                    host.controller.step().as_str(),
                    "recording_error",
                    &signal.status_line(),
                ))?;
            }
            host.feed(WizardEvent::Recording(signal))?;
        }

        let seen = observed.load(Ordering::SeqCst);
        if seen > announced {
            announced = seen;
            if !terminal.stdin_is_tty() {
                terminal.write_line(&structured_fallback_line(
                    host.controller.step().as_str(),
                    "recording",
                    "recording started",
                ))?;
            }
        }

        let pending = produced
            .lock()
            .map_err(|_| GuidepostError::Io("submission slot poisoned".to_string()))?
            .take();
        if let Some(responses) = pending {
            host.feed(session.begin_submission())?;
            terminal.write_line(&render_envelope(&cfg.task.title, &responses)?)?;
            if let Some(transcript) = host.transcript.as_mut() {
                transcript.record_submission(&responses)?;
            }
            host.feed(session.finish_submission())?;
            submission = Some(responses);
            break;
        }

        host.render()?;

        let Some(line) = terminal.read_line()? else {
            break;
        };
        match action_for_input(&line, host.controller.step()) {
            Some(HotkeyAction::Quit) => break,
            Some(HotkeyAction::Wizard(event)) => {
                host.feed(event)?;
            }
            None => {
                if !terminal.stdin_is_tty() {
                    terminal.write_line(&structured_fallback_line(
                        host.controller.step().as_str(),
                        "unrecognized",
                        &line,
                    ))?;
                }
            }
        }
    }

    if let Err(error) = engine.stop() {
        append_run_log("warn", "recording.stop_failed", json!({"error": error.to_string()}));
    }
    if let Some(transcript) = host.transcript.take() {
        transcript.finish(submission.is_some())?;
    }
    append_run_log(
        "info",
        "session.finished",
        json!({"submitted": submission.is_some(), "events": host.events}),
    );

    Ok(SessionSummary {
        submission,
        events: host.events,
        recording_observed: observed.load(Ordering::SeqCst),
    })
}
