use serde::{Deserialize, Serialize};
use std::fmt;

use super::question::{LessonId, QuestionKey, QuestionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
    /// Six questions drawn from one lesson.
    LessonPractice,
    /// Remediation across the lessons preceding a practice slot.
    PersonalizedPractice,
}

impl PracticeMode {
    pub fn label(self) -> &'static str {
        match self {
            PracticeMode::LessonPractice => "lesson_practice",
            PracticeMode::PersonalizedPractice => "personalized_practice",
        }
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A question eligible for a draw, with its selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub lesson_id: LessonId,
    pub question_index: u32,
    pub question: QuestionRecord,
    pub score: f64,
    pub position: u32,
}

impl ScoredCandidate {
    pub fn key(&self) -> QuestionKey {
        QuestionKey::new(self.lesson_id, self.question_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    /// Target reached (or every question shown in lesson practice).
    Completed,
    /// Queue ran dry before the target with nothing left to replenish from.
    Exhausted,
    Abandoned,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Exhausted => "exhausted",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: PracticeMode,
    pub status: SessionStatus,
    pub questions_shown: usize,
    pub distinct_questions: usize,
    pub correct: u32,
    pub warned: u32,
    pub wrong: u32,
    pub progress: f64,
    pub target: f64,
}

impl SessionSummary {
    pub fn target_reached(&self) -> bool {
        self.progress >= self.target
    }
}
