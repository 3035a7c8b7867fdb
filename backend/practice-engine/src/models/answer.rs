use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::question::LessonId;

/// Outcome of one question instance as seen by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Correct,
    Warned,
    Wrong,
}

impl AttemptOutcome {
    /// The persisted form of this outcome. Correct answers are never stored.
    pub fn as_answer_result(self) -> Option<AnswerResult> {
        match self {
            AttemptOutcome::Correct => None,
            AttemptOutcome::Warned => Some(AnswerResult::Warned),
            AttemptOutcome::Wrong => Some(AnswerResult::Wrong),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttemptOutcome::Correct => "correct",
            AttemptOutcome::Warned => "warned",
            AttemptOutcome::Wrong => "wrong",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A degraded outcome worth remediating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerResult {
    Warned,
    Wrong,
}

impl AnswerResult {
    pub fn label(self) -> &'static str {
        match self {
            AnswerResult::Warned => "warned",
            AnswerResult::Wrong => "wrong",
        }
    }
}

impl From<AnswerResult> for AttemptOutcome {
    fn from(result: AnswerResult) -> Self {
        match result {
            AnswerResult::Warned => AttemptOutcome::Warned,
            AnswerResult::Wrong => AttemptOutcome::Wrong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub result: AnswerResult,
    pub position: u32,
    pub frequency: u32,
    pub last_updated: DateTime<Utc>,
}

impl AnswerEvent {
    pub fn first(result: AnswerResult, position: u32, at: DateTime<Utc>) -> Self {
        Self {
            result,
            position,
            frequency: 1,
            last_updated: at,
        }
    }

    /// Upsert over an existing event: bump the count, take the latest result.
    pub fn bump(&mut self, result: AnswerResult, position: u32, at: DateTime<Utc>) {
        self.frequency = self.frequency.saturating_add(1);
        self.result = result;
        self.position = position;
        self.last_updated = at;
    }
}

/// Events of one lesson keyed by question index.
pub type LessonAnswers = BTreeMap<u32, AnswerEvent>;

/// Events of several lessons keyed by lesson id.
pub type AnswerHistory = BTreeMap<LessonId, LessonAnswers>;

/// Row shape of the remote `lesson_frequency` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEventDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub lesson_id: i64,
    pub question_index: i64,
    pub question_position: i64,
    pub result: AnswerResult,
    pub frequency: i64,
    pub last_updated: mongodb::bson::DateTime,
}

impl AnswerEventDocument {
    pub fn document_id(user_id: &str, lesson_id: LessonId, question_index: u32) -> String {
        format!("{}:{}:{}", user_id, lesson_id, question_index)
    }

    pub fn into_event(self) -> (LessonId, u32, AnswerEvent) {
        let event = AnswerEvent {
            result: self.result,
            position: u32::try_from(self.question_position).unwrap_or(0),
            frequency: u32::try_from(self.frequency).unwrap_or(u32::MAX),
            last_updated: crate::utils::time::bson_to_chrono(self.last_updated),
        };
        (
            u32::try_from(self.lesson_id).unwrap_or(0),
            u32::try_from(self.question_index).unwrap_or(0),
            event,
        )
    }
}
