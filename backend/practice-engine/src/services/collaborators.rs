//! Capabilities the engine consumes but does not own.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::models::LessonId;

/// Resolves the signed-in learner, if any.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn current_user_key(&self) -> Option<String>;
}

/// Fixed identity, or `None` for guests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl StaticIdentity {
    pub fn user(user_key: impl Into<String>) -> Self {
        Self(Some(user_key.into()))
    }

    pub fn guest() -> Self {
        Self(None)
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn current_user_key(&self) -> Option<String> {
        self.0.clone()
    }
}

#[async_trait]
pub trait LessonCompletionOracle: Send + Sync {
    async fn is_lesson_completed(&self, lesson_id: LessonId) -> bool;
}

#[derive(Debug, Default)]
pub struct CompletedLessons {
    completed: Mutex<HashSet<LessonId>>,
}

impl CompletedLessons {
    pub fn new<I: IntoIterator<Item = LessonId>>(lessons: I) -> Self {
        Self {
            completed: Mutex::new(lessons.into_iter().collect()),
        }
    }

    pub fn mark_completed(&self, lesson_id: LessonId) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.insert(lesson_id);
        }
    }
}

#[async_trait]
impl LessonCompletionOracle for CompletedLessons {
    async fn is_lesson_completed(&self, lesson_id: LessonId) -> bool {
        self.completed
            .lock()
            .map(|completed| completed.contains(&lesson_id))
            .unwrap_or(false)
    }
}

/// Receives one notification per correctly answered question instance.
pub trait RewardSink: Send + Sync {
    fn reward(&self, amount: u32);
}

/// Drops rewards on the floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewards;

impl RewardSink for NoRewards {
    fn reward(&self, _amount: u32) {}
}
