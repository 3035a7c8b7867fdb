use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use super::answer_store::AnswerEventStore;
use super::collaborators::LessonCompletionOracle;
use super::question_bank::QuestionBank;
use crate::metrics::PRACTICE_POOL_SIZE;
use crate::models::{AnswerEvent, AnswerResult, LessonId, PracticeMode, ScoredCandidate};

/// Weight of an untouched question in a completed lesson.
pub const COMPLETED_REVIEW_SCORE: f64 = 0.1;

/// Remediation weight in personalized practice. Early questions are
/// foundational, so the weight decays with position; 0 outside 1..=9.
pub fn score_for(position: u32, result: AnswerResult) -> f64 {
    match (position, result) {
        (1..=3, AnswerResult::Warned) => 1.0,
        (1..=3, AnswerResult::Wrong) => 2.0,
        (4..=6, AnswerResult::Warned) => 0.6,
        (4..=6, AnswerResult::Wrong) => 1.2,
        (7..=9, AnswerResult::Warned) => 0.3,
        (7..=9, AnswerResult::Wrong) => 0.6,
        _ => 0.0,
    }
}

/// Weight in single-lesson practice: every question counts, history boosts.
pub fn lesson_weight(event: Option<&AnswerEvent>) -> f64 {
    match event.map(|e| e.result) {
        None => 1.0,
        Some(AnswerResult::Warned) => 2.0,
        Some(AnswerResult::Wrong) => 3.0,
    }
}

pub struct PoolBuilder {
    bank: Arc<dyn QuestionBank>,
    store: Arc<AnswerEventStore>,
    completion: Arc<dyn LessonCompletionOracle>,
}

impl PoolBuilder {
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        store: Arc<AnswerEventStore>,
        completion: Arc<dyn LessonCompletionOracle>,
    ) -> Self {
        Self {
            bank,
            store,
            completion,
        }
    }

    /// Every question of the lesson, weighted 1/2/3 by its history.
    pub async fn lesson_pool(&self, lesson_id: LessonId) -> Result<Vec<ScoredCandidate>> {
        let questions = self
            .bank
            .questions(lesson_id)
            .await
            .with_context(|| format!("Failed to load questions for lesson {}", lesson_id))?;
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let answers = self.store.get_for_lesson(lesson_id).await;
        let pool: Vec<ScoredCandidate> = questions
            .into_iter()
            .map(|question| {
                let event = answers.get(&question.question_index);
                ScoredCandidate {
                    lesson_id,
                    question_index: question.question_index,
                    position: question.position(),
                    score: lesson_weight(event),
                    question,
                }
            })
            .collect();

        debug!(
            "Built lesson practice pool for lesson {}: {} candidates, {} with history",
            lesson_id,
            pool.len(),
            answers.len()
        );
        PRACTICE_POOL_SIZE
            .with_label_values(&[PracticeMode::LessonPractice.label()])
            .observe(pool.len() as f64);

        Ok(pool)
    }

    /// Questions with warned/wrong history across `lesson_ids`, plus light
    /// review candidates from completed lessons. Zero-score candidates are
    /// never emitted.
    pub async fn personalized_pool(&self, lesson_ids: &[LessonId]) -> Result<Vec<ScoredCandidate>> {
        let history = self.store.get_for_lessons(lesson_ids).await;
        let mut pool = Vec::new();

        for &lesson_id in lesson_ids {
            let questions = self
                .bank
                .questions(lesson_id)
                .await
                .with_context(|| format!("Failed to load questions for lesson {}", lesson_id))?;
            let answers = history.get(&lesson_id);
            let completed = self.completion.is_lesson_completed(lesson_id).await;

            for question in questions {
                let candidate = match answers.and_then(|a| a.get(&question.question_index)) {
                    Some(event) => {
                        let score = score_for(event.position, event.result);
                        if score <= 0.0 {
                            debug!(
                                "Skipping question {} at position {}: no remediation weight",
                                question.key(),
                                event.position
                            );
                            continue;
                        }
                        ScoredCandidate {
                            lesson_id,
                            question_index: question.question_index,
                            position: event.position,
                            score,
                            question,
                        }
                    }
                    None if completed => ScoredCandidate {
                        lesson_id,
                        question_index: question.question_index,
                        position: question.position(),
                        score: COMPLETED_REVIEW_SCORE,
                        question,
                    },
                    None => continue,
                };
                pool.push(candidate);
            }
        }

        debug!(
            "Built personalized pool from lessons {:?}: {} candidates",
            lesson_ids,
            pool.len()
        );
        PRACTICE_POOL_SIZE
            .with_label_values(&[PracticeMode::PersonalizedPractice.label()])
            .observe(pool.len() as f64);

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn score_table_matches_position_bands() {
        assert_eq!(score_for(2, AnswerResult::Wrong), 2.0);
        assert_eq!(score_for(5, AnswerResult::Warned), 0.6);
        assert_eq!(score_for(8, AnswerResult::Wrong), 0.6);
        assert_eq!(score_for(9, AnswerResult::Warned), 0.3);
        assert_eq!(score_for(1, AnswerResult::Warned), 1.0);
        assert_eq!(score_for(6, AnswerResult::Wrong), 1.2);
    }

    #[test]
    fn score_is_zero_outside_known_positions() {
        assert_eq!(score_for(0, AnswerResult::Wrong), 0.0);
        assert_eq!(score_for(10, AnswerResult::Wrong), 0.0);
        assert_eq!(score_for(10, AnswerResult::Warned), 0.0);
    }

    #[test]
    fn wrong_always_outweighs_warned_at_same_position() {
        for position in 1..=9 {
            assert!(score_for(position, AnswerResult::Wrong) > score_for(position, AnswerResult::Warned));
        }
    }

    #[test]
    fn lesson_weights_are_flat() {
        let now = Utc::now();
        let warned = AnswerEvent::first(AnswerResult::Warned, 8, now);
        let wrong = AnswerEvent::first(AnswerResult::Wrong, 8, now);
        assert_eq!(lesson_weight(None), 1.0);
        assert_eq!(lesson_weight(Some(&warned)), 2.0);
        assert_eq!(lesson_weight(Some(&wrong)), 3.0);
    }
}
