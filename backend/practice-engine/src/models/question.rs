use serde::{Deserialize, Serialize};
use std::fmt;

/// Lessons are numbered from 1 in path order.
pub type LessonId = u32;

/// Identifies one question across all lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionKey {
    pub lesson_id: LessonId,
    pub question_index: u32,
}

impl QuestionKey {
    pub fn new(lesson_id: LessonId, question_index: u32) -> Self {
        Self {
            lesson_id,
            question_index,
        }
    }

    /// 1-based position inside the lesson.
    pub fn position(&self) -> u32 {
        self.question_index + 1
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lesson_id, self.question_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq,
    IllustratedMcq,
}

/// A question as served by the question bank. Only `correct_answer` and the
/// option ids matter to the engine; the body is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub lesson_id: LessonId,
    pub question_index: u32,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub body: serde_json::Value,
    pub options: Vec<QuestionOption>,
    pub correct_answer: String,
}

impl QuestionRecord {
    pub fn key(&self) -> QuestionKey {
        QuestionKey::new(self.lesson_id, self.question_index)
    }

    pub fn position(&self) -> u32 {
        self.question_index + 1
    }

    pub fn is_correct(&self, option_id: &str) -> bool {
        self.correct_answer == option_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}
