#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use practice_engine::config::{Config, PracticeSettings};
use practice_engine::models::{
    AnswerEvent, AnswerHistory, AnswerResult, LessonId, QuestionKey, QuestionKind,
    QuestionOption, QuestionRecord,
};
use practice_engine::services::answer_store::StoreError;
use practice_engine::services::collaborators::{CompletedLessons, RewardSink, StaticIdentity};
use practice_engine::services::local_store::LocalAnswerStore;
use practice_engine::services::question_bank::StaticQuestionBank;
use practice_engine::services::remote_store::RemoteAnswerStore;
use practice_engine::{AppState, Collaborators};

pub const CORRECT: &str = "a";
pub const INCORRECT: &str = "b";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Remote store kept in memory. Every call fails while `fail` is on.
#[derive(Default)]
pub struct InMemoryRemote {
    rows: Mutex<HashMap<String, AnswerHistory>>,
    failing: AtomicBool,
    calls: AtomicU32,
}

impl InMemoryRemote {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn history(&self, user_key: &str) -> AnswerHistory {
        self.rows
            .lock()
            .unwrap()
            .get(user_key)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("remote offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteAnswerStore for InMemoryRemote {
    async fn upsert(
        &self,
        user_key: &str,
        key: QuestionKey,
        result: AnswerResult,
        at: DateTime<Utc>,
    ) -> Result<AnswerEvent, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let event = rows
            .entry(user_key.to_string())
            .or_default()
            .entry(key.lesson_id)
            .or_default()
            .entry(key.question_index)
            .and_modify(|event| event.bump(result, key.position(), at))
            .or_insert_with(|| AnswerEvent::first(result, key.position(), at))
            .clone();
        Ok(event)
    }

    async fn fetch(
        &self,
        user_key: &str,
        lesson_ids: &[LessonId],
    ) -> Result<AnswerHistory, StoreError> {
        self.check()?;
        let mut history = self.history(user_key);
        history.retain(|lesson_id, _| lesson_ids.contains(lesson_id));
        Ok(history)
    }

    async fn delete(&self, user_key: &str, lesson_id: Option<LessonId>) -> Result<(), StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        match lesson_id {
            Some(lesson_id) => {
                if let Some(history) = rows.get_mut(user_key) {
                    history.remove(&lesson_id);
                }
            }
            None => {
                rows.remove(user_key);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingRewards {
    total: AtomicU32,
    events: AtomicU32,
}

impl CountingRewards {
    pub fn total(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> u32 {
        self.events.load(Ordering::SeqCst)
    }
}

impl RewardSink for CountingRewards {
    fn reward(&self, amount: u32) {
        self.total.fetch_add(amount, Ordering::SeqCst);
        self.events.fetch_add(1, Ordering::SeqCst);
    }
}

/// `count` two-option questions; option `a` is always right.
pub fn lesson_questions(lesson_id: LessonId, count: u32) -> Vec<QuestionRecord> {
    (0..count)
        .map(|index| QuestionRecord {
            lesson_id,
            question_index: index,
            kind: QuestionKind::Mcq,
            body: serde_json::json!({ "question": format!("Lesson {} question {}", lesson_id, index + 1) }),
            options: vec![
                QuestionOption {
                    id: CORRECT.to_string(),
                    text: "Right".to_string(),
                },
                QuestionOption {
                    id: INCORRECT.to_string(),
                    text: "Wrong".to_string(),
                },
            ],
            correct_answer: CORRECT.to_string(),
        })
        .collect()
}

pub fn test_config(seed: u64) -> Config {
    Config {
        mongo_uri: None,
        mongo_database: "practice_test".to_string(),
        answers_collection: "lesson_frequency".to_string(),
        redis_uri: None,
        local_store_dir: PathBuf::from(".practice-store-test"),
        practice: PracticeSettings {
            seed: Some(seed),
            ..PracticeSettings::default()
        },
    }
}

pub struct TestEngine {
    pub state: AppState,
    pub remote: Arc<InMemoryRemote>,
    pub local: Arc<LocalAnswerStore>,
    pub completion: Arc<CompletedLessons>,
    pub rewards: Arc<CountingRewards>,
}

/// Engine over in-memory backends. `lessons` lists `(lesson id, question count)`.
pub fn create_test_engine(identity: StaticIdentity, lessons: &[(LessonId, u32)]) -> TestEngine {
    init_tracing();

    let mut bank = StaticQuestionBank::new();
    for &(lesson_id, count) in lessons {
        bank.insert_lesson(lesson_id, lesson_questions(lesson_id, count));
    }

    let remote = Arc::new(InMemoryRemote::default());
    let local = Arc::new(LocalAnswerStore::in_memory());
    let completion = Arc::new(CompletedLessons::default());
    let rewards = Arc::new(CountingRewards::default());

    let state = AppState::with_backends(
        test_config(7),
        Collaborators {
            identity: Arc::new(identity),
            bank: Arc::new(bank),
            completion: completion.clone(),
            rewards: rewards.clone(),
        },
        Some(remote.clone()),
        local.clone(),
    );

    TestEngine {
        state,
        remote,
        local,
        completion,
        rewards,
    }
}
