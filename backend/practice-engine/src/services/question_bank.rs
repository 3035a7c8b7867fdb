use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::models::{LessonId, QuestionKind, QuestionOption, QuestionRecord};

/// Read-only source of each lesson's questions in display order.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Unknown lessons yield an empty list.
    async fn questions(&self, lesson_id: LessonId) -> Result<Vec<QuestionRecord>>;
}

/// Lessons held in memory, typically loaded once from bundled JSON.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestionBank {
    lessons: HashMap<LessonId, Vec<QuestionRecord>>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(rename = "type", default = "default_kind")]
    kind: QuestionKind,
    #[serde(default)]
    body: serde_json::Value,
    options: Vec<QuestionOption>,
    #[serde(rename = "correctAnswer", alias = "correct_answer")]
    correct_answer: String,
}

fn default_kind() -> QuestionKind {
    QuestionKind::Mcq
}

impl StaticQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{"<lessonId>": [question, ...], ...}`. Question indices come
    /// from array order.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<LessonId, Vec<RawQuestion>> =
            serde_json::from_str(json).context("Failed to parse question bank JSON")?;

        let mut bank = Self::new();
        for (lesson_id, questions) in raw {
            let records = questions
                .into_iter()
                .enumerate()
                .map(|(index, q)| QuestionRecord {
                    lesson_id,
                    question_index: index as u32,
                    kind: q.kind,
                    body: q.body,
                    options: q.options,
                    correct_answer: q.correct_answer,
                })
                .collect();
            bank.lessons.insert(lesson_id, records);
        }

        tracing::info!("Loaded question bank with {} lessons", bank.lessons.len());
        Ok(bank)
    }

    /// Replaces a lesson, re-deriving ids and indices from the slice order.
    pub fn insert_lesson(&mut self, lesson_id: LessonId, questions: Vec<QuestionRecord>) {
        let records = questions
            .into_iter()
            .enumerate()
            .map(|(index, mut q)| {
                q.lesson_id = lesson_id;
                q.question_index = index as u32;
                q
            })
            .collect();
        self.lessons.insert(lesson_id, records);
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }
}

#[async_trait]
impl QuestionBank for StaticQuestionBank {
    async fn questions(&self, lesson_id: LessonId) -> Result<Vec<QuestionRecord>> {
        Ok(self.lessons.get(&lesson_id).cloned().unwrap_or_default())
    }
}
