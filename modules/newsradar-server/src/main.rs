use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use llm_client::OpenAi;
use newsradar_common::Config;
use newsradar_engine::{
    AnalyzeOptions, Analyzer, Enricher, HeuristicScorer, HotnessScorer, LearnedScorer,
    RemoteScorer,
};
use newsradar_index::{ClusterIndex, SharedIndex};
use newsradar_ingest::{
    reconcile, HttpEmbedder, Ingestor, LlmRelevanceModel, RelevanceClassifier, TextEmbedder,
    Worker,
};
use newsradar_queue::QueueClient;
use newsradar_scout::{RssScraper, Scheduler, SchedulerOptions, SEED_SOURCES};
use newsradar_store::{ArticleRepo, PgStore, SourceRepo};

use newsradar_server::http;

#[derive(Parser)]
#[command(name = "newsradar", about = "Hot financial news detection pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema.
    InitDb,
    /// Load the initial source registry with default reputations.
    SeedSources,
    /// Serve the HTTP API.
    RunApi,
    /// Consume the article queue.
    RunWorker,
    /// Drive the collection scrapers on a schedule.
    RunScheduler,
    /// Run one ranking & enrichment pass and print the report.
    Analyse {
        #[arg(long = "window", default_value_t = 24)]
        window_hours: u32,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Fan the enrichment calls out concurrently.
        #[arg(long = "async", default_value_t = false)]
        concurrent: bool,
        /// Also write the report to a JSON file.
        #[arg(long)]
        output: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::InitDb => init_db().await,
        Command::SeedSources => seed_sources().await,
        Command::RunApi => run_api().await,
        Command::RunWorker => run_worker().await,
        Command::RunScheduler => run_scheduler().await,
        Command::Analyse {
            window_hours,
            top_k,
            concurrent,
            output,
        } => analyse(window_hours, top_k, concurrent, output).await,
    }
}

// ---------------------------------------------------------------------------
// Construction — explicit, at process start
// ---------------------------------------------------------------------------

fn chat_agent(config: &Config) -> OpenAi {
    OpenAi::new(&config.llm_api_key, &config.llm_model)
        .with_base_url(&config.llm_base_url)
        .with_timeout(Duration::from_secs(config.llm_timeout_secs))
}

fn embedder(config: &Config) -> Arc<dyn TextEmbedder> {
    let agent = OpenAi::new(&config.embedding_api_key, &config.embedding_model)
        .with_base_url(&config.embedding_base_url)
        .with_embedding_model(&config.embedding_model)
        .with_timeout(Duration::from_secs(config.llm_timeout_secs));
    Arc::new(HttpEmbedder::new(agent, config.embedding_dimension))
}

/// Restore the index snapshot, or start empty and let reconciliation
/// rebuild from the article store.
fn load_index(config: &Config) -> Result<SharedIndex> {
    let (index, restored) =
        ClusterIndex::load_or_new(Path::new(&config.index_dir), config.embedding_dimension)?;
    if !restored {
        warn!(dir = %config.index_dir, "Starting with an empty index");
    }
    Ok(SharedIndex::new(
        index,
        config.index_dir.clone(),
        config.index_snapshot_every,
    ))
}

fn ingestor(config: &Config, store: Arc<PgStore>, index: SharedIndex) -> Arc<Ingestor> {
    let classifier = RelevanceClassifier::new(
        Arc::new(LlmRelevanceModel::new(chat_agent(config))),
        config.classifier_min_confidence,
    );
    Arc::new(Ingestor::new(
        store.clone(),
        store,
        index,
        embedder(config),
        classifier,
        config.similarity_threshold,
    ))
}

fn analyzer(config: &Config, store: Arc<PgStore>) -> Arc<Analyzer> {
    let learned: Arc<dyn LearnedScorer> = match &config.scorer_url {
        Some(url) => Arc::new(RemoteScorer::new(url)),
        None => Arc::new(HeuristicScorer),
    };
    Arc::new(Analyzer::new(
        store.clone(),
        store,
        HotnessScorer::new(),
        learned,
        Enricher::new(
            Arc::new(chat_agent(config)),
            Duration::from_secs(config.llm_timeout_secs),
        ),
        AnalyzeOptions {
            learned_weight: config.learned_weight,
            hot_threshold: config.hotness_threshold,
            enrich_concurrency: config.enrich_concurrency,
        },
    ))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn init_db() -> Result<()> {
    let config = Config::db_from_env();
    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    info!("Schema created");
    Ok(())
}

async fn seed_sources() -> Result<()> {
    let config = Config::db_from_env();
    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    for (name, url, reputation) in SEED_SOURCES.iter().copied() {
        let id = store.get_or_create(name, url).await?;
        store.set_reputation(id, reputation).await?;
        info!(source = name, id, reputation, "Source seeded");
    }
    Ok(())
}

async fn run_api() -> Result<()> {
    let config = Config::api_from_env();
    config.log_redacted();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let index = load_index(&config)?;
    let embed = embedder(&config);
    reconcile(store.as_ref() as &dyn ArticleRepo, embed.as_ref(), &index).await?;

    let state = Arc::new(http::AppState {
        ingestor: ingestor(&config, store.clone(), index.clone()),
        analyzer: analyzer(&config, store.clone()),
        sources: store,
    });

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {addr}"))?;
    info!(addr, "API listening");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = index.snapshot_now().await {
        warn!(error = %e, "Final snapshot failed");
    }
    info!("API stopped");
    Ok(())
}

async fn run_worker() -> Result<()> {
    let config = Config::worker_from_env();
    config.log_redacted();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let index = load_index(&config)?;
    let embed = embedder(&config);
    let queue = QueueClient::connect(&config.amqp_url, &config.queue_name).await?;

    let worker = Worker::new(
        queue.clone(),
        ingestor(&config, store.clone(), index.clone()),
        store,
        embed,
        index.clone(),
        config.worker_prefetch,
        config.max_delivery_attempts,
    );

    tokio::select! {
        result = worker.run() => result?,
        _ = shutdown_signal() => info!("Worker interrupted"),
    }

    if let Err(e) = index.snapshot_now().await {
        warn!(error = %e, "Final snapshot failed");
    }
    queue.close().await?;
    Ok(())
}

async fn run_scheduler() -> Result<()> {
    let config = Config::scheduler_from_env();
    config.log_redacted();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let queue = QueueClient::connect(&config.amqp_url, &config.queue_name).await?;

    let mut scheduler = Scheduler::new(
        Arc::new(queue.clone()),
        SchedulerOptions {
            interval: Duration::from_secs(config.scheduler_interval_minutes * 60),
            run_deadline: Duration::from_secs(config.scheduler_run_deadline_secs),
            ..Default::default()
        },
    );
    for (name, site, feed) in newsradar_scout::seeds::DEFAULT_FEEDS {
        scheduler.register(Arc::new(RssScraper::new(name, site, feed)));
    }
    scheduler.bootstrap_seen(store.as_ref() as &dyn ArticleRepo).await?;

    tokio::select! {
        result = scheduler.run() => result?,
        _ = shutdown_signal() => info!("Scheduler interrupted"),
    }

    queue.close().await?;
    Ok(())
}

async fn analyse(
    window_hours: u32,
    top_k: usize,
    concurrent: bool,
    output: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = Config::api_from_env();

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    let report = analyzer(&config, store)
        .analyse(window_hours, top_k, concurrent)
        .await?;

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output {
        std::fs::write(&path, &json).context(format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), results = report.results.len(), "Report written");
    }
    println!("{json}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Shutdown signal listener failed");
    }
}
