//! Device-local answer history.
//!
//! The whole history is one JSON blob `{lessonId: {questionIndex: event}}`
//! under a single key of a [`KeyValueStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use super::answer_store::{AnswerBackend, StoreError};
use crate::metrics::track_store_operation;
use crate::models::{AnswerEvent, AnswerHistory, AnswerResult, LessonId, QuestionKey};

pub const ANSWERS_STORAGE_KEY: &str = "practice_answers";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys live under `prefix` in a Redis instance local to the device.
pub struct RedisKeyValueStore {
    redis: ConnectionManager,
    prefix: String,
}

impl RedisKeyValueStore {
    pub fn new(redis: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(self.full_key(key))
            .arg(value)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        redis::cmd("DEL")
            .arg(self.full_key(key))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

pub struct LocalAnswerStore {
    kv: Box<dyn KeyValueStore>,
    storage_key: String,
    // Serialises read-modify-write cycles on the blob
    write_lock: tokio::sync::Mutex<()>,
}

impl LocalAnswerStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, ANSWERS_STORAGE_KEY)
    }

    pub fn with_key(kv: Box<dyn KeyValueStore>, storage_key: impl Into<String>) -> Self {
        Self {
            kv,
            storage_key: storage_key.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryKeyValueStore::new()))
    }

    async fn load(&self) -> Result<AnswerHistory, StoreError> {
        match self.kv.get(&self.storage_key).await? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(AnswerHistory::new()),
        }
    }

    async fn save(&self, history: &AnswerHistory) -> Result<(), StoreError> {
        let blob = serde_json::to_string(history)?;
        self.kv.set(&self.storage_key, &blob).await
    }
}

#[async_trait]
impl AnswerBackend for LocalAnswerStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upsert(
        &self,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError> {
        track_store_operation("record", self.kv.name(), async {
            let _guard = self.write_lock.lock().await;
            let mut history = self.load().await?;

            let event = history
                .entry(key.lesson_id)
                .or_default()
                .entry(key.question_index)
                .and_modify(|event| event.bump(result, key.position(), at))
                .or_insert_with(|| AnswerEvent::first(result, key.position(), at))
                .clone();

            self.save(&history).await?;
            Ok::<_, StoreError>(event)
        })
        .await
    }

    async fn fetch(&self, lesson_ids: &[LessonId]) -> Result<AnswerHistory, StoreError> {
        track_store_operation("fetch", self.kv.name(), async {
            let mut history = self.load().await?;
            history.retain(|lesson_id, answers| {
                lesson_ids.contains(lesson_id) && !answers.is_empty()
            });
            Ok::<_, StoreError>(history)
        })
        .await
    }

    async fn remove(&self, lesson_id: Option<LessonId>) -> Result<(), StoreError> {
        track_store_operation("clear", self.kv.name(), async {
            let _guard = self.write_lock.lock().await;
            match lesson_id {
                None => self.kv.remove(&self.storage_key).await,
                Some(lesson_id) => {
                    let mut history = self.load().await?;
                    if history.remove(&lesson_id).is_some() {
                        self.save(&history).await?;
                    }
                    Ok::<_, StoreError>(())
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(lesson_id: LessonId, index: u32) -> QuestionKey {
        QuestionKey::new(lesson_id, index)
    }

    #[tokio::test]
    async fn upsert_increments_frequency_and_keeps_latest_result() {
        let store = LocalAnswerStore::in_memory();
        let t0 = Utc::now();

        let first = store
            .upsert(key(1, 2), AnswerResult::Warned, t0)
            .await
            .unwrap();
        assert_eq!(first.frequency, 1);
        assert_eq!(first.position, 3);

        let t1 = t0 + chrono::Duration::seconds(1);
        let second = store
            .upsert(key(1, 2), AnswerResult::Wrong, t1)
            .await
            .unwrap();
        assert_eq!(second.frequency, 2);
        assert_eq!(second.result, AnswerResult::Wrong);
        assert_eq!(second.last_updated, t1);
    }

    #[tokio::test]
    async fn fetch_only_returns_requested_lessons() {
        let store = LocalAnswerStore::in_memory();
        let now = Utc::now();
        store.upsert(key(1, 0), AnswerResult::Wrong, now).await.unwrap();
        store.upsert(key(2, 4), AnswerResult::Warned, now).await.unwrap();
        store.upsert(key(3, 1), AnswerResult::Wrong, now).await.unwrap();

        let history = store.fetch(&[1, 3, 9]).await.unwrap();
        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert!(history[&3].contains_key(&1));
    }

    #[tokio::test]
    async fn remove_one_lesson_or_everything() {
        let store = LocalAnswerStore::in_memory();
        let now = Utc::now();
        store.upsert(key(1, 0), AnswerResult::Wrong, now).await.unwrap();
        store.upsert(key(2, 0), AnswerResult::Wrong, now).await.unwrap();

        store.remove(Some(1)).await.unwrap();
        let history = store.fetch(&[1, 2]).await.unwrap();
        assert!(!history.contains_key(&1));
        assert!(history.contains_key(&2));

        store.remove(None).await.unwrap();
        assert!(store.fetch(&[1, 2]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_upserts_do_not_lose_counts() {
        let store = std::sync::Arc::new(LocalAnswerStore::in_memory());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert(key(5, 1), AnswerResult::Wrong, Utc::now())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let history = store.fetch(&[5]).await.unwrap();
        assert_eq!(history[&5][&1].frequency, 20);
    }

    #[tokio::test]
    async fn corrupt_blob_is_a_serialization_error() {
        let kv = MemoryKeyValueStore::new();
        kv.set(ANSWERS_STORAGE_KEY, "not json").await.unwrap();
        let store = LocalAnswerStore::new(Box::new(kv));

        let err = store.fetch(&[1]).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();

        let store = LocalAnswerStore::new(Box::new(FileKeyValueStore::new(dir.path())));
        store.upsert(key(4, 3), AnswerResult::Warned, now).await.unwrap();

        let reopened = LocalAnswerStore::new(Box::new(FileKeyValueStore::new(dir.path())));
        let history = reopened.fetch(&[4]).await.unwrap();
        assert_eq!(history[&4][&3].result, AnswerResult::Warned);

        reopened.remove(None).await.unwrap();
        reopened.remove(None).await.unwrap();
        assert!(reopened.fetch(&[4]).await.unwrap().is_empty());
    }
}
