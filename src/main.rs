use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cluster_engine::ClusterEngine;
use database::Database;
use embedding_engine::MiniLmEmbedder;
use llm_interface::OpenAiProvider;
use reddit_client::{RedditApiClient, RedditCollector};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trend_core::AppConfig;
use trend_pipeline::{ActionQueueWriter, TrendPipeline, TrendValidator};

const DEFAULT_LOG_FILTER: &str =
    "trend_hunter=info,trend_pipeline=info,reddit_client=info,cluster_engine=info,database=info";

#[derive(Parser)]
#[command(name = "trend-hunter", about = "Find visual trends in social posts and queue product searches")]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Fetch Reddit listings into the store
    Collect,
    /// Cluster stored posts, judge the clusters and queue search actions
    Analyze,
    /// Collect, then analyze
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let mut db = Database::new(config.database.url.clone())
        .with_max_connections(config.database.max_connections);
    db.connect().await.context("connecting to the store")?;
    db.run_migrations().await.context("running migrations")?;

    let result = match cli.command {
        Command::Collect => collect(&config, &db).await,
        Command::Analyze => analyze(&config, &db).await,
        Command::Run => {
            async {
                collect(&config, &db).await?;
                analyze(&config, &db).await
            }
            .await
        }
    };

    db.close().await;
    result
}

async fn collect(config: &AppConfig, db: &Database) -> Result<()> {
    info!("Collecting from {} subreddits", config.reddit.subreddits.len());

    let client = RedditApiClient::from_config(&config.reddit)?;
    let collector = RedditCollector::new(client, db, &config.reddit);
    let report = collector.collect_all().await?;

    info!("Collect done: {}", report);
    Ok(())
}

async fn analyze(config: &AppConfig, db: &Database) -> Result<()> {
    let judge = OpenAiProvider::from_config(&config.judge)?;
    let embedder = MiniLmEmbedder::load(
        &config.embedding.model_dir,
        config.embedding.batch_size,
        config.embedding.max_tokens,
    )
    .with_context(|| {
        format!(
            "loading embedding model from {}",
            config.embedding.model_dir.display()
        )
    })?;

    let pipeline = TrendPipeline::new(
        ClusterEngine::from_config(embedder, &config.clustering)?,
        TrendValidator::new(judge).with_min_relevance_score(config.judge.min_relevance_score),
        ActionQueueWriter::new(db).with_product_suffix(config.pipeline.product_suffix.clone()),
    )
    .with_post_limit(config.pipeline.post_limit);

    let report = pipeline.run().await?;
    for queued in &report.queued {
        for action in &queued.actions {
            info!("Queued search '{}' (trend {})", action.search_phrase, queued.trend.id);
        }
    }

    info!("Analyze done: {}", report);
    Ok(())
}
