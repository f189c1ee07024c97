use crate::controller::WizardEvent;
use crate::steps::{spec_for, AnswerKind};
use crate::types::{Step, TaskSuccess, MAX_DIFFICULTY, MIN_DIFFICULTY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: char,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyAction {
    Wizard(WizardEvent),
    Quit,
}

/// Marks a key press on steps that accept free text, so that a one-letter
/// answer such as `q` is never mistaken for a command.
pub const COMMAND_PREFIX: char = ':';

pub const GLOBAL_BINDINGS: [HotkeyBinding; 2] = [
    HotkeyBinding {
        key: 'r',
        action: "reshare screen",
    },
    HotkeyBinding {
        key: 'q',
        action: "quit",
    },
];

pub const WELCOME_BINDINGS: [HotkeyBinding; 1] = [HotkeyBinding {
    key: 'n',
    action: "continue",
}];

pub const TASK_BRIEF_BINDINGS: [HotkeyBinding; 3] = [
    HotkeyBinding {
        key: 's',
        action: "start task",
    },
    HotkeyBinding {
        key: 'd',
        action: "I'm done",
    },
    HotkeyBinding {
        key: 'o',
        action: "open panel",
    },
];

pub const QUESTION_BINDINGS: [HotkeyBinding; 2] = [
    HotkeyBinding {
        key: 'n',
        action: "next",
    },
    HotkeyBinding {
        key: 'o',
        action: "open panel",
    },
];

pub fn controls_legend(step: Step) -> String {
    let mut bindings = match step {
        Step::Welcome => WELCOME_BINDINGS.to_vec(),
        Step::TaskBrief => TASK_BRIEF_BINDINGS.to_vec(),
        _ => QUESTION_BINDINGS.to_vec(),
    };
    bindings.extend(GLOBAL_BINDINGS);
    let prefix = if takes_free_text(step) { ":" } else { "" };
    let mut legend = format_bindings("Keys: ", prefix, &bindings);
    match step {
        Step::Q1TaskSuccess => legend.push_str("  | answer: yes / partially / no"),
        Step::Q2Difficulty => legend.push_str(&format!(
            "  | answer: {MIN_DIFFICULTY}-{MAX_DIFFICULTY}"
        )),
        Step::Q3Confusing | Step::Q4WorkedWell => legend.push_str("  | answer: type a response"),
        Step::Welcome | Step::TaskBrief => {}
    }
    legend
}

/// Maps one line of participant input to an action for the displayed step.
///
/// On choice and rating steps a single-character line is a key press. On
/// free-text steps keys must carry [`COMMAND_PREFIX`] (`:n`, `:q`); every
/// other line is the answer, even a single letter.
pub fn action_for_input(line: &str, step: Step) -> Option<HotkeyAction> {
    let trimmed = line.trim();
    let key_line = if takes_free_text(step) {
        trimmed.strip_prefix(COMMAND_PREFIX)
    } else {
        Some(trimmed)
    };
    if let Some(key) = key_line.and_then(single_char) {
        if let Some(action) = action_for_key(key, step) {
            return Some(action);
        }
    }
    answer_for_step(line, step).map(HotkeyAction::Wizard)
}

pub fn takes_free_text(step: Step) -> bool {
    spec_for(step).answer == AnswerKind::FreeText
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Some(key),
        _ => None,
    }
}

pub fn action_for_key(key: char, step: Step) -> Option<HotkeyAction> {
    let event = match (key, step) {
        ('q', _) => return Some(HotkeyAction::Quit),
        ('r', _) => WizardEvent::Reshare,
        ('n', Step::Welcome) => WizardEvent::Advance,
        ('s', Step::TaskBrief) => WizardEvent::StartTask,
        ('d', Step::TaskBrief) => WizardEvent::FinishTask,
        ('o', Step::Welcome) => return None,
        ('o', _) => WizardEvent::ReopenPanel,
        ('n', _) if step.is_question() => WizardEvent::Advance,
        _ => return None,
    };
    Some(HotkeyAction::Wizard(event))
}

fn answer_for_step(line: &str, step: Step) -> Option<WizardEvent> {
    match step {
        Step::Q1TaskSuccess => TaskSuccess::parse(line).map(WizardEvent::SelectTaskSuccess),
        Step::Q2Difficulty => line
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|value| (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(value))
            .map(WizardEvent::SelectDifficulty),
        Step::Q3Confusing => Some(WizardEvent::EditConfusing(line.to_string())),
        Step::Q4WorkedWell => Some(WizardEvent::EditWorkedWell(line.to_string())),
        Step::Welcome | Step::TaskBrief => None,
    }
}

fn format_bindings(label: &str, key_prefix: &str, bindings: &[HotkeyBinding]) -> String {
    let parts = bindings
        .iter()
        .map(|binding| format!("{key_prefix}{} {}", binding.key, binding.action))
        .collect::<Vec<_>>();
    format!("{label}{}", parts.join("  "))
}
