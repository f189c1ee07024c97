use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Welcome,
    TaskBrief,
    Q1TaskSuccess,
    Q2Difficulty,
    Q3Confusing,
    Q4WorkedWell,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Self::Welcome,
        Self::TaskBrief,
        Self::Q1TaskSuccess,
        Self::Q2Difficulty,
        Self::Q3Confusing,
        Self::Q4WorkedWell,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Welcome => 0,
            Self::TaskBrief => 1,
            Self::Q1TaskSuccess => 2,
            Self::Q2Difficulty => 3,
            Self::Q3Confusing => 4,
            Self::Q4WorkedWell => 5,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_question(self) -> bool {
        matches!(
            self,
            Self::Q1TaskSuccess | Self::Q2Difficulty | Self::Q3Confusing | Self::Q4WorkedWell
        )
    }

    pub fn is_final(self) -> bool {
        self == Self::Q4WorkedWell
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::TaskBrief => "task_brief",
            Self::Q1TaskSuccess => "q1_task_success",
            Self::Q2Difficulty => "q2_difficulty",
            Self::Q3Confusing => "q3_confusing",
            Self::Q4WorkedWell => "q4_worked_well",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSuccess {
    Yes,
    Partially,
    No,
}

impl TaskSuccess {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Some(Self::Yes),
            "partially" | "partial" | "p" => Some(Self::Partially),
            "no" => Some(Self::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::Partially => "partially",
            Self::No => "no",
        }
    }
}

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// Draft field a validation error is keyed on. The serialized names are the
/// keys hosts see in the error map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "taskSuccess")]
    TaskSuccess,
    #[serde(rename = "difficulty")]
    Difficulty,
    #[serde(rename = "confusing")]
    Confusing,
    #[serde(rename = "workedWell")]
    WorkedWell,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskSuccess => "taskSuccess",
            Self::Difficulty => "difficulty",
            Self::Confusing => "confusing",
            Self::WorkedWell => "workedWell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderMode {
    Process,
    Simulated,
}

impl RecorderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Simulated => "simulated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Step, TaskSuccess};

    #[test]
    fn steps_are_ordered_and_chain_forward() {
        for window in Step::ALL.windows(2) {
            assert!(window[0] < window[1]);
            assert_eq!(window[0].next(), Some(window[1]));
        }
        assert_eq!(Step::Q4WorkedWell.next(), None);
        assert_eq!(Step::Q2Difficulty.index(), 3);
    }

    #[test]
    fn only_the_last_question_is_final() {
        let finals = Step::ALL
            .into_iter()
            .filter(|step| step.is_final())
            .collect::<Vec<_>>();
        assert_eq!(finals, vec![Step::Q4WorkedWell]);
    }

    #[test]
    fn task_success_parses_short_and_long_forms() {
        assert_eq!(TaskSuccess::parse("Partially"), Some(TaskSuccess::Partially));
        assert_eq!(TaskSuccess::parse(" y "), Some(TaskSuccess::Yes));
        assert_eq!(TaskSuccess::parse("no"), Some(TaskSuccess::No));
        assert_eq!(TaskSuccess::parse("maybe"), None);
    }
}
