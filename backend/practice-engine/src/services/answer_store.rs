//! Durable history of warned/wrong answers.
//!
//! Every caller goes through [`AnswerEventStore`], which picks a backend per
//! call: a signed-in learner gets the remote store with the local store as a
//! fallback, a guest gets the local store alone. Read failures never reach
//! the caller; they degrade to whatever the fallback (or an empty history)
//! provides.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::collaborators::IdentityResolver;
use super::local_store::LocalAnswerStore;
use super::remote_store::RemoteAnswerStore;
use crate::metrics::{record_fallback, track_store_operation, ANSWER_EVENTS_RECORDED_TOTAL};
use crate::models::{
    AnswerEvent, AnswerHistory, AnswerResult, AttemptOutcome, LessonAnswers, LessonId,
    QuestionKey,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongo error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One place answer events can live.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inserts a first event or bumps the existing one; returns the stored event.
    async fn upsert(
        &self,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError>;

    /// Events for the given lessons. Lessons without events are absent.
    async fn fetch(&self, lesson_ids: &[LessonId]) -> Result<AnswerHistory, StoreError>;

    /// Drops one lesson's events, or everything when `lesson_id` is `None`.
    async fn remove(&self, lesson_id: Option<LessonId>) -> Result<(), StoreError>;
}

/// Tries `primary` and serves the same call from `secondary` on any error.
pub struct FallbackBackend {
    primary: Arc<dyn AnswerBackend>,
    secondary: Arc<dyn AnswerBackend>,
}

impl FallbackBackend {
    pub fn new(primary: Arc<dyn AnswerBackend>, secondary: Arc<dyn AnswerBackend>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl AnswerBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn upsert(
        &self,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError> {
        match self.primary.upsert(key, result, at).await {
            Ok(event) => Ok(event),
            Err(e) => {
                warn!(
                    "{} store failed to record {} ({}), falling back to {}",
                    self.primary.name(),
                    key,
                    e,
                    self.secondary.name()
                );
                record_fallback("record");
                self.secondary.upsert(key, result, at).await
            }
        }
    }

    async fn fetch(&self, lesson_ids: &[LessonId]) -> Result<AnswerHistory, StoreError> {
        match self.primary.fetch(lesson_ids).await {
            Ok(history) => Ok(history),
            Err(e) => {
                warn!(
                    "{} store failed to read lessons {:?} ({}), falling back to {}",
                    self.primary.name(),
                    lesson_ids,
                    e,
                    self.secondary.name()
                );
                record_fallback("fetch");
                self.secondary.fetch(lesson_ids).await
            }
        }
    }

    async fn remove(&self, lesson_id: Option<LessonId>) -> Result<(), StoreError> {
        match self.primary.remove(lesson_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    "{} store failed to clear ({}), falling back to {}",
                    self.primary.name(),
                    e,
                    self.secondary.name()
                );
                record_fallback("clear");
                self.secondary.remove(lesson_id).await
            }
        }
    }
}

/// The remote store bound to one learner.
pub struct UserScopedRemote {
    remote: Arc<dyn RemoteAnswerStore>,
    user_key: String,
}

impl UserScopedRemote {
    pub fn new(remote: Arc<dyn RemoteAnswerStore>, user_key: String) -> Self {
        Self { remote, user_key }
    }
}

#[async_trait]
impl AnswerBackend for UserScopedRemote {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn upsert(
        &self,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError> {
        track_store_operation(
            "record",
            self.name(),
            self.remote.upsert(&self.user_key, key, result, at),
        )
        .await
    }

    async fn fetch(&self, lesson_ids: &[LessonId]) -> Result<AnswerHistory, StoreError> {
        track_store_operation(
            "fetch",
            self.name(),
            self.remote.fetch(&self.user_key, lesson_ids),
        )
        .await
    }

    async fn remove(&self, lesson_id: Option<LessonId>) -> Result<(), StoreError> {
        track_store_operation(
            "clear",
            self.name(),
            self.remote.delete(&self.user_key, lesson_id),
        )
        .await
    }
}

pub struct AnswerEventStore {
    identity: Arc<dyn IdentityResolver>,
    remote: Option<Arc<dyn RemoteAnswerStore>>,
    local: Arc<LocalAnswerStore>,
}

impl AnswerEventStore {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        remote: Option<Arc<dyn RemoteAnswerStore>>,
        local: Arc<LocalAnswerStore>,
    ) -> Self {
        Self {
            identity,
            remote,
            local,
        }
    }

    /// Backend for this call. The identity is resolved every time so a
    /// learner signing in mid-session switches over immediately.
    async fn backend(&self) -> Arc<dyn AnswerBackend> {
        let user_key = self.identity.current_user_key().await;
        match (user_key, &self.remote) {
            (Some(user_key), Some(remote)) => {
                let primary: Arc<dyn AnswerBackend> =
                    Arc::new(UserScopedRemote::new(remote.clone(), user_key));
                Arc::new(FallbackBackend::new(primary, self.local.clone()))
            }
            _ => self.local.clone(),
        }
    }

    /// Persists a degraded outcome. `Correct` is ignored and yields `Ok(None)`.
    pub async fn record(
        &self,
        lesson_id: LessonId,
        question_index: u32,
        outcome: AttemptOutcome,
    ) -> Result<Option<AnswerEvent>, StoreError> {
        let Some(result) = outcome.as_answer_result() else {
            return Ok(None);
        };

        let key = QuestionKey::new(lesson_id, question_index);
        let backend = self.backend().await;
        let event = backend.upsert(key, result, Utc::now()).await?;

        ANSWER_EVENTS_RECORDED_TOTAL
            .with_label_values(&[result.label(), backend.name()])
            .inc();
        debug!(
            "Recorded {} for question {} (frequency {})",
            result.label(),
            key,
            event.frequency
        );

        Ok(Some(event))
    }

    pub async fn get_for_lesson(&self, lesson_id: LessonId) -> LessonAnswers {
        self.get_for_lessons(&[lesson_id])
            .await
            .remove(&lesson_id)
            .unwrap_or_default()
    }

    pub async fn get_for_lessons(&self, lesson_ids: &[LessonId]) -> AnswerHistory {
        if lesson_ids.is_empty() {
            return AnswerHistory::new();
        }

        let backend = self.backend().await;
        match backend.fetch(lesson_ids).await {
            Ok(history) => history,
            Err(e) => {
                error!(
                    "Failed to read answer history for lessons {:?}: {}",
                    lesson_ids, e
                );
                AnswerHistory::new()
            }
        }
    }

    /// Clears remote rows for the signed-in learner (best effort) and the
    /// local history.
    pub async fn clear(&self, lesson_id: Option<LessonId>) -> Result<(), StoreError> {
        if let (Some(user_key), Some(remote)) =
            (self.identity.current_user_key().await, &self.remote)
        {
            let scoped = UserScopedRemote::new(remote.clone(), user_key);
            if let Err(e) = scoped.remove(lesson_id).await {
                error!("Failed to clear remote answer history: {}", e);
            }
        }

        self.local.remove(lesson_id).await
    }
}
