use crate::draft::ResponseDraft;
use serde::{Deserialize, Serialize};

pub const QUESTIONS: [(&str, &str); 4] = [
    ("task-success", "Did you complete the task successfully?"),
    ("difficulty-rating", "How difficult was this task?"),
    ("most-confusing", "What was most confusing or difficult?"),
    ("what-worked-well", "What worked well?"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntry {
    pub question_id: String,
    pub question_text: String,
    pub answer: String,
}

/// The finished survey, always four entries in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission {
    entries: Vec<SubmissionEntry>,
}

impl Submission {
    /// Returns `None` unless every draft field is filled in.
    pub fn from_draft(draft: &ResponseDraft) -> Option<Self> {
        if !draft.is_complete() {
            return None;
        }
        let task_success = draft.task_success?;
        let difficulty = draft.difficulty?;
        let answers = [
            task_success.as_str().to_string(),
            difficulty.to_string(),
            draft.confusing.clone(),
            draft.worked_well.clone(),
        ];
        let entries = QUESTIONS
            .iter()
            .zip(answers)
            .map(|((question_id, question_text), answer)| SubmissionEntry {
                question_id: question_id.to_string(),
                question_text: question_text.to_string(),
                answer,
            })
            .collect();
        Some(Self { entries })
    }

    pub fn entries(&self) -> &[SubmissionEntry] {
        &self.entries
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.question_id == question_id)
            .map(|entry| entry.answer.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskSuccess;

    fn complete_draft() -> ResponseDraft {
        ResponseDraft {
            task_success: Some(TaskSuccess::Partially),
            difficulty: Some(3),
            confusing: "nothing".to_string(),
            worked_well: "layout".to_string(),
        }
    }

    #[test]
    fn submission_matches_question_table_and_stringifies_rating() {
        let submission = Submission::from_draft(&complete_draft()).expect("complete");
        let json = serde_json::to_value(&submission).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!([
                {"questionId": "task-success", "questionText": "Did you complete the task successfully?", "answer": "partially"},
                {"questionId": "difficulty-rating", "questionText": "How difficult was this task?", "answer": "3"},
                {"questionId": "most-confusing", "questionText": "What was most confusing or difficult?", "answer": "nothing"},
                {"questionId": "what-worked-well", "questionText": "What worked well?", "answer": "layout"},
            ])
        );
    }

    #[test]
    fn incomplete_draft_yields_nothing() {
        let mut draft = complete_draft();
        draft.worked_well = "  ".to_string();
        assert!(Submission::from_draft(&draft).is_none());
    }

    #[test]
    fn free_text_answers_are_kept_verbatim() {
        let mut draft = complete_draft();
        draft.confusing = "  the save button  ".to_string();
        let submission = Submission::from_draft(&draft).expect("complete");
        assert_eq!(submission.answer("most-confusing"), Some("  the save button  "));
        assert_eq!(submission.entries().len(), 4);
    }
}
