use crate::types::{Field, TaskSuccess, MAX_DIFFICULTY, MIN_DIFFICULTY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDraft {
    pub task_success: Option<TaskSuccess>,
    pub difficulty: Option<u8>,
    pub confusing: String,
    pub worked_well: String,
}

impl ResponseDraft {
    pub fn is_field_valid(&self, field: Field) -> bool {
        match field {
            Field::TaskSuccess => self.task_success.is_some(),
            Field::Difficulty => self
                .difficulty
                .is_some_and(|value| (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&value)),
            Field::Confusing => !self.confusing.trim().is_empty(),
            Field::WorkedWell => !self.worked_well.trim().is_empty(),
        }
    }

    pub fn is_complete(&self) -> bool {
        [
            Field::TaskSuccess,
            Field::Difficulty,
            Field::Confusing,
            Field::WorkedWell,
        ]
        .into_iter()
        .all(|field| self.is_field_valid(field))
    }
}

/// Per-field validation messages. Entries are only added by an explicit
/// validation pass and are dropped as soon as their field is edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    entries: BTreeMap<Field, String>,
}

impl ValidationErrors {
    pub fn set(&mut self, field: Field, message: impl Into<String>) {
        self.entries.insert(field, message.into());
    }

    pub fn clear(&mut self, field: Field) -> bool {
        self.entries.remove(&field).is_some()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.entries.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.entries.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_and_out_of_range_ratings_are_invalid() {
        let draft = ResponseDraft {
            task_success: Some(TaskSuccess::No),
            difficulty: Some(6),
            confusing: "   ".to_string(),
            worked_well: "\tlayout ".to_string(),
        };
        assert!(draft.is_field_valid(Field::TaskSuccess));
        assert!(!draft.is_field_valid(Field::Difficulty));
        assert!(!draft.is_field_valid(Field::Confusing));
        assert!(draft.is_field_valid(Field::WorkedWell));
        assert!(!draft.is_complete());
    }

    #[test]
    fn error_map_serializes_with_host_field_keys() {
        let mut errors = ValidationErrors::default();
        errors.set(Field::WorkedWell, "Please provide a response");
        let json = serde_json::to_value(&errors).expect("serialize");
        assert_eq!(json, serde_json::json!({"workedWell": "Please provide a response"}));
        assert!(errors.clear(Field::WorkedWell));
        assert!(!errors.clear(Field::WorkedWell));
        assert!(errors.is_empty());
    }
}
