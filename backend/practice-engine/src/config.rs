use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// No URI means answers are only kept in the local store.
    pub mongo_uri: Option<String>,
    pub mongo_database: String,
    pub answers_collection: String,
    /// When set, the local store lives in Redis instead of files.
    pub redis_uri: Option<String>,
    pub local_store_dir: PathBuf,
    pub practice: PracticeSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PracticeSettings {
    pub lesson_practice_questions: usize,
    pub personalized_target: f64,
    pub personalized_initial_draw: usize,
    pub personalized_source_lessons: usize,
    pub lesson_practice_reward: u32,
    pub personalized_reward: u32,
    /// Fixed RNG seed for reproducible draws.
    pub seed: Option<u64>,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            lesson_practice_questions: 6,
            personalized_target: 5.0,
            personalized_initial_draw: 5,
            personalized_source_lessons: 2,
            lesson_practice_reward: 2,
            personalized_reward: 5,
            seed: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &config::Config) -> Result<Self, config::ConfigError> {
        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .ok()
            .or_else(|| env::var("MONGO_URI").ok())
            .filter(|uri| !uri.trim().is_empty());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "practice".to_string());

        let answers_collection = settings
            .get_string("database.answers_collection")
            .unwrap_or_else(|_| "lesson_frequency".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .ok()
            .or_else(|| env::var("REDIS_URI").ok())
            .filter(|uri| !uri.trim().is_empty());

        let local_store_dir = settings
            .get_string("local_store.dir")
            .or_else(|_| env::var("PRACTICE_STORE_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".practice-store"));

        let defaults = PracticeSettings::default();
        let practice = PracticeSettings {
            lesson_practice_questions: read_usize(
                settings,
                "practice.lesson_practice_questions",
                defaults.lesson_practice_questions,
            )?,
            personalized_target: match settings.get_float("practice.personalized_target") {
                Ok(v) if v > 0.0 => v,
                Ok(v) => {
                    return Err(config::ConfigError::Message(format!(
                        "practice.personalized_target must be positive, got {}",
                        v
                    )))
                }
                Err(config::ConfigError::NotFound(_)) => defaults.personalized_target,
                Err(e) => return Err(e),
            },
            personalized_initial_draw: read_usize(
                settings,
                "practice.personalized_initial_draw",
                defaults.personalized_initial_draw,
            )?,
            personalized_source_lessons: read_usize(
                settings,
                "practice.personalized_source_lessons",
                defaults.personalized_source_lessons,
            )?,
            lesson_practice_reward: read_u32(
                settings,
                "practice.lesson_practice_reward",
                defaults.lesson_practice_reward,
            )?,
            personalized_reward: read_u32(
                settings,
                "practice.personalized_reward",
                defaults.personalized_reward,
            )?,
            seed: match settings.get_int("practice.seed") {
                Ok(v) => Some(v as u64),
                Err(config::ConfigError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
        };

        Ok(Config {
            mongo_uri,
            mongo_database,
            answers_collection,
            redis_uri,
            local_store_dir,
            practice,
        })
    }
}

fn read_usize(
    settings: &config::Config,
    key: &str,
    default: usize,
) -> Result<usize, config::ConfigError> {
    match settings.get_int(key) {
        Ok(v) => usize::try_from(v)
            .map_err(|_| config::ConfigError::Message(format!("{} must not be negative", key))),
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

fn read_u32(settings: &config::Config, key: &str, default: u32) -> Result<u32, config::ConfigError> {
    match settings.get_int(key) {
        Ok(v) => u32::try_from(v)
            .map_err(|_| config::ConfigError::Message(format!("{} is out of range", key))),
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}
