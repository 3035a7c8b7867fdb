use crate::config::Config;
use anyhow::Context;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use answer_store::AnswerEventStore;
use collaborators::{IdentityResolver, LessonCompletionOracle, RewardSink};
use local_store::{FileKeyValueStore, KeyValueStore, LocalAnswerStore, RedisKeyValueStore};
use pool_builder::PoolBuilder;
use question_bank::QuestionBank;
use remote_store::{MongoAnswerStore, RemoteAnswerStore};
use session_service::PracticeSessionController;

/// Everything the host application provides.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolver>,
    pub bank: Arc<dyn QuestionBank>,
    pub completion: Arc<dyn LessonCompletionOracle>,
    pub rewards: Arc<dyn RewardSink>,
}

pub struct AppState {
    pub config: Config,
    pub answers: Arc<AnswerEventStore>,
    pub practice: PracticeSessionController,
}

impl AppState {
    /// Connects the configured backends: MongoDB for signed-in learners when a
    /// URI is set, and Redis or a local directory for the device store.
    pub async fn new(config: Config, collaborators: Collaborators) -> anyhow::Result<Self> {
        let remote: Option<Arc<dyn RemoteAnswerStore>> = match &config.mongo_uri {
            Some(uri) => {
                let client = mongodb::Client::with_uri_str(uri)
                    .await
                    .context("Failed to create MongoDB client")?;
                let mongo = client.database(&config.mongo_database);
                tracing::info!(
                    "Remote answer store: {}.{}",
                    config.mongo_database,
                    config.answers_collection
                );
                Some(Arc::new(MongoAnswerStore::new(
                    &mongo,
                    &config.answers_collection,
                )))
            }
            None => {
                tracing::info!("No MongoDB configured, answers are kept locally only");
                None
            }
        };

        let kv: Box<dyn KeyValueStore> = match &config.redis_uri {
            Some(uri) => {
                let redis_client =
                    redis::Client::open(uri.as_str()).context("Failed to create Redis client")?;
                Box::new(RedisKeyValueStore::new(
                    connect_redis(redis_client).await?,
                    "practice",
                ))
            }
            None => {
                tracing::info!(
                    "Local answer store in {}",
                    config.local_store_dir.display()
                );
                Box::new(FileKeyValueStore::new(config.local_store_dir.clone()))
            }
        };

        Ok(Self::with_backends(
            config,
            collaborators,
            remote,
            Arc::new(LocalAnswerStore::new(kv)),
        ))
    }

    /// Wires the engine over already constructed backends.
    pub fn with_backends(
        config: Config,
        collaborators: Collaborators,
        remote: Option<Arc<dyn RemoteAnswerStore>>,
        local: Arc<LocalAnswerStore>,
    ) -> Self {
        let answers = Arc::new(AnswerEventStore::new(
            collaborators.identity,
            remote,
            local,
        ));
        let pools = PoolBuilder::new(
            collaborators.bank,
            answers.clone(),
            collaborators.completion,
        );
        let practice = PracticeSessionController::new(
            answers.clone(),
            pools,
            collaborators.rewards,
            config.practice.clone(),
        );

        Self {
            config,
            answers,
            practice,
        }
    }
}

async fn connect_redis(redis_client: redis::Client) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");

    let redis = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        ConnectionManager::new(redis_client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    // Test connection
    let mut conn = redis.clone();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod answer_store;
pub mod attempt;
pub mod collaborators;
pub mod local_store;
pub mod pool_builder;
pub mod question_bank;
pub mod remote_store;
pub mod sampler;
pub mod session_service;
