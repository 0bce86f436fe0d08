use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres (article store + source registry)
    pub database_url: String,

    // AMQP (article work queue)
    pub amqp_url: String,
    pub queue_name: String,
    pub worker_prefetch: u16,
    pub max_delivery_attempts: u32,

    // LLM (enrichment + relevance labelling)
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,

    // Embeddings
    pub embedding_base_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,

    // ANN index persistence
    pub index_dir: String,
    pub index_snapshot_every: usize,

    // Learned scorer (optional external regressor)
    pub scorer_url: Option<String>,

    // Pipeline thresholds
    pub similarity_threshold: f32,
    pub hotness_threshold: f64,
    pub learned_weight: f64,
    pub classifier_min_confidence: f32,
    pub top_k: usize,
    pub enrich_concurrency: usize,

    // Collection scheduler
    pub scheduler_interval_minutes: u64,
    pub scheduler_run_deadline_secs: u64,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Full configuration: every subsystem. Used by `run-api`, which hosts
    /// both the synchronous ingest path and the analysis job.
    pub fn api_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            amqp_url: env::var("AMQP_URL").unwrap_or_default(),
            llm_api_key: required_env("LLM_API_KEY"),
            embedding_api_key: env::var("EMBEDDING_API_KEY")
                .unwrap_or_else(|_| required_env("LLM_API_KEY")),
            ..Self::defaults()
        }
    }

    /// Worker configuration: queue consumer + store + index + models.
    pub fn worker_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            amqp_url: required_env("AMQP_URL"),
            llm_api_key: required_env("LLM_API_KEY"),
            embedding_api_key: env::var("EMBEDDING_API_KEY")
                .unwrap_or_else(|_| required_env("LLM_API_KEY")),
            ..Self::defaults()
        }
    }

    /// Scheduler configuration: store (seen-URL bootstrap) + queue publisher.
    pub fn scheduler_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            amqp_url: required_env("AMQP_URL"),
            llm_api_key: String::new(),
            embedding_api_key: String::new(),
            ..Self::defaults()
        }
    }

    /// Database-only configuration, for `init-db` and `seed-sources`.
    pub fn db_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            amqp_url: String::new(),
            llm_api_key: String::new(),
            embedding_api_key: String::new(),
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        Self {
            database_url: String::new(),
            amqp_url: String::new(),
            queue_name: env::var("QUEUE_NAME").unwrap_or_else(|_| "news.articles".to_string()),
            worker_prefetch: parsed_env("WORKER_PREFETCH", 10),
            max_delivery_attempts: parsed_env("MAX_DELIVERY_ATTEMPTS", 3),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            llm_api_key: String::new(),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3.5-sonnet".to_string()),
            llm_timeout_secs: parsed_env("LLM_TIMEOUT_SECS", 60),
            embedding_base_url: env::var("EMBEDDING_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_api_key: String::new(),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_dimension: parsed_env("EMBEDDING_DIMENSION", 384),
            scorer_url: env::var("SCORER_URL").ok(),
            index_dir: env::var("INDEX_DIR").unwrap_or_else(|_| "./data/index".to_string()),
            index_snapshot_every: parsed_env("INDEX_SNAPSHOT_EVERY", 100),
            similarity_threshold: parsed_env("SIMILARITY_THRESHOLD", 0.85),
            hotness_threshold: parsed_env("HOTNESS_THRESHOLD", 0.7),
            learned_weight: parsed_env("LEARNED_WEIGHT", 0.3),
            classifier_min_confidence: parsed_env("CLASSIFIER_MIN_CONFIDENCE", 0.5),
            top_k: parsed_env("TOP_K", 10),
            enrich_concurrency: parsed_env("ENRICH_CONCURRENCY", 4),
            scheduler_interval_minutes: parsed_env("SCHEDULER_INTERVAL_MINUTES", 5),
            scheduler_run_deadline_secs: parsed_env("SCHEDULER_RUN_DEADLINE_SECS", 240),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parsed_env("WEB_PORT", 8000),
        }
    }

    /// Log the non-secret parts of the configuration at start-up.
    pub fn log_redacted(&self) {
        info!(
            queue = %self.queue_name,
            embedding_model = %self.embedding_model,
            embedding_dimension = self.embedding_dimension,
            llm_model = %self.llm_model,
            similarity_threshold = self.similarity_threshold,
            hotness_threshold = self.hotness_threshold,
            learned_weight = self.learned_weight,
            "Configuration loaded"
        );
    }
}

fn required_env(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("{name} environment variable must be set"))
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
