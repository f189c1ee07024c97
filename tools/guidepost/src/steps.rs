//! Declarative description of the six wizard steps.
//!
//! The controller never branches on step content; it looks up the
//! [`StepSpec`] for the displayed step and applies its rule.

use crate::draft::ResponseDraft;
use crate::types::{Field, Step};

pub const SELECT_OPTION_MESSAGE: &str = "Please select an option";
pub const SELECT_DIFFICULTY_MESSAGE: &str = "Please select a difficulty rating";
pub const PROVIDE_RESPONSE_MESSAGE: &str = "Please provide a response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    None,
    Choice(&'static [(&'static str, &'static str)]),
    Rating,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: Field,
    pub error_message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub step: Step,
    pub title: &'static str,
    pub body: &'static str,
    pub answer: AnswerKind,
    pub rule: Option<FieldRule>,
}

impl StepSpec {
    /// Returns the field and message to record when the draft does not
    /// satisfy this step's rule.
    pub fn error_if_invalid(&self, draft: &ResponseDraft) -> Option<(Field, &'static str)> {
        let rule = self.rule?;
        if draft.is_field_valid(rule.field) {
            None
        } else {
            Some((rule.field, rule.error_message))
        }
    }
}

pub const TASK_SUCCESS_OPTIONS: [(&str, &str); 3] = [
    ("yes", "Yes"),
    ("partially", "Partially"),
    ("no", "No"),
];

pub const STEP_TABLE: [StepSpec; 6] = [
    StepSpec {
        step: Step::Welcome,
        title: "Welcome",
        body: "Thanks for helping us test. Please share your screen so we can record the session.",
        answer: AnswerKind::None,
        rule: None,
    },
    StepSpec {
        step: Step::TaskBrief,
        title: "Your task",
        body: "Read the task below, then start. This panel collapses while you work; reopen it when you are done.",
        answer: AnswerKind::None,
        rule: None,
    },
    StepSpec {
        step: Step::Q1TaskSuccess,
        title: "Did you complete the task successfully?",
        body: "",
        answer: AnswerKind::Choice(&TASK_SUCCESS_OPTIONS),
        rule: Some(FieldRule {
            field: Field::TaskSuccess,
            error_message: SELECT_OPTION_MESSAGE,
        }),
    },
    StepSpec {
        step: Step::Q2Difficulty,
        title: "How difficult was this task?",
        body: "1 = very easy, 5 = very difficult",
        answer: AnswerKind::Rating,
        rule: Some(FieldRule {
            field: Field::Difficulty,
            error_message: SELECT_DIFFICULTY_MESSAGE,
        }),
    },
    StepSpec {
        step: Step::Q3Confusing,
        title: "What was most confusing or difficult?",
        body: "",
        answer: AnswerKind::FreeText,
        rule: Some(FieldRule {
            field: Field::Confusing,
            error_message: PROVIDE_RESPONSE_MESSAGE,
        }),
    },
    StepSpec {
        step: Step::Q4WorkedWell,
        title: "What worked well?",
        body: "",
        answer: AnswerKind::FreeText,
        rule: Some(FieldRule {
            field: Field::WorkedWell,
            error_message: PROVIDE_RESPONSE_MESSAGE,
        }),
    },
];

pub fn spec_for(step: Step) -> &'static StepSpec {
    &STEP_TABLE[step.index()]
}

pub fn step_for_field(field: Field) -> Step {
    match field {
        Field::TaskSuccess => Step::Q1TaskSuccess,
        Field::Difficulty => Step::Q2Difficulty,
        Field::Confusing => Step::Q3Confusing,
        Field::WorkedWell => Step::Q4WorkedWell,
    }
}
