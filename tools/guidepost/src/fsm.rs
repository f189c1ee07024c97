use crate::errors::GuidepostError;
use crate::types::Step;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub step: Step,
    pub visible: bool,
    pub task_started: bool,
    pub recording_requested: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: Step::Welcome,
            visible: true,
            task_started: false,
            recording_requested: false,
        }
    }
}

impl WizardState {
    pub fn transition(&mut self, next: Step) -> Result<(), GuidepostError> {
        validate_transition(self.step, next)?;
        self.step = next;
        Ok(())
    }

    /// Collapses the panel into its tab once the participant heads off to do
    /// the task.
    pub fn start_task(&mut self) -> Result<(), GuidepostError> {
        if self.step != Step::TaskBrief {
            return Err(GuidepostError::InvalidConfig(
                "task can only be started from the task brief".to_string(),
            ));
        }
        self.task_started = true;
        self.visible = false;
        Ok(())
    }

    pub fn finish_task(&mut self) -> Result<(), GuidepostError> {
        self.transition(Step::Q1TaskSuccess)?;
        self.visible = true;
        Ok(())
    }

    /// Returns whether the panel was actually re-opened.
    pub fn reopen(&mut self) -> bool {
        if self.step == Step::Welcome || self.visible {
            return false;
        }
        self.visible = true;
        true
    }
}

pub fn validate_transition(from: Step, to: Step) -> Result<(), GuidepostError> {
    if from.next() != Some(to) {
        return Err(GuidepostError::InvalidConfig(format!(
            "illegal transition: {:?} -> {:?}",
            from, to
        )));
    }
    Ok(())
}
