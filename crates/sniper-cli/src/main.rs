use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sniper_adapters::{
    HttpRelevanceOracle, OracleConfig, TelegramSink, TelegramSinkConfig, ZakupkiConfig, ZakupkiFeed,
};
use sniper_engine::{build_scheduler, EngineConfig, PipelineEngine};
use sniper_match::{MatcherRules, SmartMatcher};
use sniper_regions::RegionRegistry;
use sniper_storage::{HttpClientConfig, HttpFetcher, SniperStore};

#[derive(Debug, Parser)]
#[command(name = "tender-sniper")]
#[command(about = "Procurement feed monitoring and notification pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the poll loop with background maintenance until interrupted.
    Monitor,
    /// Run exactly one poll cycle and print its summary.
    Cycle,
    /// Create the database and bootstrap the schema.
    Migrate,
    /// Sweep expired cache entries and stale reservations once.
    Sweep,
    /// Show what the engine would work with.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command.unwrap_or(Commands::Monitor) {
        Commands::Monitor => {
            let (engine, store) = build_engine(&config).await?;
            let scheduler = build_scheduler(store, config.poll_interval).await?;
            scheduler.start().await.context("starting maintenance scheduler")?;
            info!(interval_secs = config.poll_interval.as_secs(), "monitoring started");

            tokio::select! {
                result = engine.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, draining");
                    engine.stop();
                }
            }
        }
        Commands::Cycle => {
            let (engine, _store) = build_engine(&config).await?;
            let summary = engine.run_cycle().await?;
            println!(
                "cycle complete: filters={} candidates={} enriched={} oracle={} sent={} deduped={} quiet={} quota={}",
                summary.filters_processed,
                summary.candidates_seen,
                summary.enriched,
                summary.oracle_consulted,
                summary.sent,
                summary.already_delivered,
                summary.quiet_deferred,
                summary.quota_skipped,
            );
        }
        Commands::Migrate => {
            SniperStore::connect(&config.database_url).await?;
            println!("schema ready at {}", config.database_url);
        }
        Commands::Sweep => {
            let store = SniperStore::connect(&config.database_url).await?;
            let now = Utc::now();
            let cache = store.cache_sweep(now).await?;
            let reservations = store
                .expire_tentative(now - chrono::Duration::from_std(config.poll_interval)?)
                .await?;
            let filters = store
                .purge_deleted_filters(now - chrono::Duration::days(30))
                .await?;
            println!("swept: cache={cache} reservations={reservations} filters={filters}");
        }
        Commands::Status => {
            let store = SniperStore::connect(&config.database_url).await?;
            let filters = store.active_filters().await?;
            println!("active filters: {}", filters.len());
            for (filter, subscriber) in &filters {
                println!(
                    "- [{}] {} (subscriber {}, tier {}, {} keywords)",
                    filter.id,
                    filter.name,
                    subscriber.id,
                    subscriber.tier.as_str(),
                    filter.keywords.len(),
                );
            }
        }
    }

    Ok(())
}

async fn build_engine(config: &EngineConfig) -> Result<(PipelineEngine, SniperStore)> {
    let store = SniperStore::connect(&config.database_url)
        .await
        .context("connecting to the database")?;

    let fetcher = Arc::new(
        HttpFetcher::new(HttpClientConfig {
            timeout: config.http_timeout,
            user_agent: Some(config.user_agent.clone()),
            global_concurrency: config.enrich_global,
            per_scope_concurrency: config.enrich_per_filter,
            min_request_interval: Some(config.feed_min_interval),
            ..HttpClientConfig::default()
        })
        .context("building the http fetcher")?,
    );

    let feed = Arc::new(ZakupkiFeed::new(
        fetcher,
        Arc::new(RegionRegistry::new()),
        store.clone(),
        ZakupkiConfig {
            base_url: config.feed_base_url.clone(),
            ..ZakupkiConfig::default()
        },
    ));

    let oracle = Arc::new(
        HttpRelevanceOracle::new(
            OracleConfig {
                endpoint: config.oracle_endpoint.clone(),
                model: config.oracle_model.clone(),
                api_key: config.oracle_api_key.clone(),
                timeout: config.http_timeout,
            },
            store.clone(),
        )
        .context("building the relevance oracle")?,
    );

    let sink = Arc::new(
        TelegramSink::new(TelegramSinkConfig {
            timeout: Duration::from_secs(10),
            ..TelegramSinkConfig::new(config.bot_token.clone())
        })
        .context("building the notification sink")?,
    );

    let rules = MatcherRules::from_workspace_root(&config.workspace_root)
        .context("loading matcher rules")?;
    let matcher = SmartMatcher::new(rules, config.null_region_policy);

    let engine = PipelineEngine::new(
        store.clone(),
        feed,
        oracle,
        sink,
        matcher,
        config.clone(),
    );
    Ok((engine, store))
}
