// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use phoca_search::models::search::SearchRequest;
use phoca_search::models::settings::Settings;
use phoca_search::services::barter_search::BarterSearchService;
use phoca_search::services::count_queue::RedisCountQueue;
use phoca_search::services::counter_store::PostgresCounterStore;
use phoca_search::services::location::RedisLocationCache;
use phoca_search::services::logging::init_tracing;
use phoca_search::services::search::SearchClient;
use phoca_search::services::search_count_worker::SearchCountWorker;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::info;

// Version is extracted from Cargo.toml at compile time via build.rs
// In CI/CD, the patch version can be overridden via PHOCA_PATCH_VERSION env var
const VERSION: &str = env!("PHOCA_VERSION");

#[derive(Parser)]
#[command(name = "phoca-search", version = VERSION, about = "Barter search and idol ranking worker")]
struct Cli {
    /// Log output format
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Text,
        global = true
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduled drain and rollup jobs until interrupted
    Run,
    /// Drain the search count queue once
    Drain,
    /// Roll up today's search counts into a ranking snapshot
    Rollup,
    /// Configure searchable, filterable and sortable index attributes
    InitIndex,
    /// Apply database migrations
    Migrate,
    /// Run one barter search and print the results as JSON
    Search {
        /// SearchRequest JSON; omit to list every listing newest first
        #[arg(long)]
        request: Option<String>,
    },
    /// Print the owners of wishes matching a title and idol ids
    Wishes {
        #[arg(long)]
        title: String,
        #[arg(long = "idol", required = true)]
        idols: Vec<i64>,
    },
}

async fn redis_connection(settings: &Settings) -> Result<ConnectionManager> {
    let client = redis::Client::open(settings.redis_url.as_str())
        .with_context(|| format!("Invalid REDIS_URL: {}", settings.redis_url))?;
    client
        .get_connection_manager()
        .await
        .context("Failed to connect to Redis")
}

async fn counter_worker(settings: &Settings) -> Result<SearchCountWorker> {
    let redis = redis_connection(settings).await?;
    let queue = RedisCountQueue::new(redis, &settings.search_count_queue);
    let store = PostgresCounterStore::connect(
        settings.database_url()?,
        settings.database_max_connections,
    )
    .await?;

    Ok(SearchCountWorker::new(
        Arc::new(queue),
        Arc::new(store),
        settings.worker.clone(),
    ))
}

fn search_client(settings: &Settings) -> Result<SearchClient> {
    SearchClient::new(
        &settings.meilisearch_host,
        settings.meilisearch_api_key.clone(),
        settings.barter_index.clone(),
        settings.wish_index.clone(),
    )
}

async fn search_service(settings: &Settings) -> Result<BarterSearchService> {
    let redis = redis_connection(settings).await?;
    let locations = RedisLocationCache::new(redis.clone(), settings.gps_key_prefix.clone());
    let counts = RedisCountQueue::new(redis, &settings.search_count_queue);

    Ok(BarterSearchService::new(
        Arc::new(search_client(settings)?),
        Arc::new(locations),
        settings.search.clone(),
    )
    .with_search_counts(Arc::new(counts)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format == LogFormat::Json);

    info!(version = VERSION, "phoca-search starting");

    let settings = Settings::from_env()?;

    match cli.command {
        Command::Run => {
            let worker = Arc::new(counter_worker(&settings).await?);
            worker.start().await;
        }
        Command::Drain => {
            let report = counter_worker(&settings).await?.drain().await?;
            println!("{}", serde_json::to_string_pretty(&report.tallies)?);
        }
        Command::Rollup => {
            let rank = counter_worker(&settings).await?.rollup_with_retry().await?;
            println!("{}", serde_json::to_string_pretty(&rank)?);
        }
        Command::InitIndex => {
            search_client(&settings)?.init_indexes().await?;
        }
        Command::Migrate => {
            PostgresCounterStore::connect(settings.database_url()?, 1)
                .await?
                .run_migrations()
                .await?;
        }
        Command::Search { request } => {
            let service = search_service(&settings).await?;
            let results = match request {
                Some(raw) => {
                    let request: SearchRequest =
                        serde_json::from_str(&raw).context("Invalid search request JSON")?;
                    service.search(request).await?
                }
                None => service.search_all().await?,
            };
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Wishes { title, idols } => {
            let owners = search_service(&settings)
                .await?
                .wish_title_search(&title, &idols)
                .await?;
            println!("{}", serde_json::to_string_pretty(&owners)?);
        }
    }

    Ok(())
}
