use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};

use super::answer_store::StoreError;
use crate::models::answer::AnswerEventDocument;
use crate::models::{AnswerEvent, AnswerHistory, AnswerResult, LessonId, QuestionKey};
use crate::utils::time::chrono_to_bson;

/// Per-learner answer history keyed by (user, lesson, question index).
#[async_trait]
pub trait RemoteAnswerStore: Send + Sync {
    async fn upsert(
        &self,
        user_key: &str,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError>;

    async fn fetch(
        &self,
        user_key: &str,
        lesson_ids: &[LessonId],
    ) -> Result<AnswerHistory, StoreError>;

    async fn delete(&self, user_key: &str, lesson_id: Option<LessonId>)
        -> Result<(), StoreError>;
}

pub struct MongoAnswerStore {
    collection: Collection<AnswerEventDocument>,
}

impl MongoAnswerStore {
    pub fn new(mongo: &Database, collection_name: &str) -> Self {
        Self {
            collection: mongo.collection(collection_name),
        }
    }
}

#[async_trait]
impl RemoteAnswerStore for MongoAnswerStore {
    async fn upsert(
        &self,
        user_key: &str,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError> {
        let id = AnswerEventDocument::document_id(user_key, key.lesson_id, key.question_index);

        // $inc on a missing field starts from zero, so a fresh row lands at 1
        let update = doc! {
            "$set": {
                "result": result.label(),
                "question_position": i64::from(key.position()),
                "last_updated": chrono_to_bson(at),
            },
            "$inc": { "frequency": 1_i64 },
            "$setOnInsert": {
                "user_id": user_key,
                "lesson_id": i64::from(key.lesson_id),
                "question_index": i64::from(key.question_index),
            },
        };

        let stored = self
            .collection
            .find_one_and_update(doc! { "_id": &id }, update)
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("upsert of {} returned nothing", id)))?;

        tracing::debug!(
            "Upserted answer event {} (frequency {})",
            stored.id,
            stored.frequency
        );

        let (_, _, event) = stored.into_event();
        Ok(event)
    }

    async fn fetch(
        &self,
        user_key: &str,
        lesson_ids: &[LessonId],
    ) -> Result<AnswerHistory, StoreError> {
        let ids: Vec<i64> = lesson_ids.iter().map(|id| i64::from(*id)).collect();
        let mut cursor = self
            .collection
            .find(doc! { "user_id": user_key, "lesson_id": { "$in": ids } })
            .await?;

        let mut history = AnswerHistory::new();
        while let Some(row) = cursor.try_next().await? {
            let (lesson_id, question_index, event) = row.into_event();
            history
                .entry(lesson_id)
                .or_default()
                .insert(question_index, event);
        }

        Ok(history)
    }

    async fn delete(
        &self,
        user_key: &str,
        lesson_id: Option<LessonId>,
    ) -> Result<(), StoreError> {
        let filter = match lesson_id {
            Some(lesson_id) => doc! { "user_id": user_key, "lesson_id": i64::from(lesson_id) },
            None => doc! { "user_id": user_key },
        };

        let deleted = self.collection.delete_many(filter).await?;
        tracing::info!(
            "Deleted {} remote answer events for user {}",
            deleted.deleted_count,
            user_key
        );
        Ok(())
    }
}
