//! Vodostaj CLI
//!
//! Refreshes river data on demand or on a schedule and queries the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use vodostaj::{
    error::Result,
    models::Config,
    pipeline::{RefreshOutcome, Refresher, SnapshotCache, format_river_report},
    services::SourceSet,
    storage::{RiverRepository, SqliteRepository},
    utils::http,
};

/// Vodostaj - River water-level scraper
#[derive(Parser, Debug)]
#[command(
    name = "vodostaj",
    version,
    about = "Scrape, store and query river water levels"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every source once and store the results
    Refresh,

    /// Refresh on a fixed interval until interrupted
    Watch {
        /// Seconds between refreshes (default: refresh.interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List rivers with stored readings
    Rivers,

    /// Show the latest reading of every station on a river
    River {
        /// River name as stored, e.g. ДУНАВ
        name: String,
    },

    /// Show when data was last updated
    LastUpdate,

    /// Validate the configuration file
    Validate,

    /// Fetch live data without storing it
    Live {
        /// River to report on; lists rivers when omitted
        river: Option<String>,
    },
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });

    match cli.command {
        Command::Refresh => {
            let (refresher, repo) = build_refresher(&config).await?;
            let result = run_refresh(&refresher).await;
            repo.close().await;
            result?;
        }

        Command::Watch { interval } => {
            let (refresher, repo) = build_refresher(&config).await?;
            let secs = interval.unwrap_or(config.refresh.interval_secs).max(1);
            log::info!("Refreshing every {secs}s, press Ctrl-C to stop");

            watch(&refresher, Duration::from_secs(secs), tokio::signal::ctrl_c()).await;
            repo.close().await;
        }

        Command::Rivers => {
            let repo = SqliteRepository::open(&config.storage.database_path).await?;
            let rivers = repo.get_unique_rivers().await?;
            if rivers.is_empty() {
                println!("No rivers stored yet. Run 'refresh' first.");
            }
            for river in rivers {
                println!("{river}");
            }
            repo.close().await;
        }

        Command::River { name } => {
            let repo = SqliteRepository::open(&config.storage.database_path).await?;
            let records = repo.get_by_river_name(&name).await?;
            if records.is_empty() {
                println!("No information for river '{name}'. Use 'rivers' to see available ones.");
            } else {
                println!("{}", format_river_report(&records));
            }
            repo.close().await;
        }

        Command::LastUpdate => {
            let repo = SqliteRepository::open(&config.storage.database_path).await?;
            match repo.get_last_update_time().await? {
                Some(ts) => println!("{}", ts.format("%Y-%m-%d %H:%M:%S %:z")),
                None => println!("No data stored yet."),
            }
            repo.close().await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} station series, regional bulletin {})",
                config.sources.stations.len(),
                if config.sources.regional.enabled { "enabled" } else { "disabled" }
            );
        }

        Command::Live { river } => {
            let client = http::create_async_client(&config.http)?;
            let sources = SourceSet::from_config(&config, &client)?;
            let cache = SnapshotCache::new(Arc::new(sources));
            let snapshot = cache
                .get_or_refresh(Duration::from_secs(config.refresh.cache_max_age_secs))
                .await?;

            match river {
                Some(name) => {
                    let records = snapshot.river(&name);
                    if records.is_empty() {
                        println!("No live information for river '{name}'.");
                    } else {
                        println!("{}", format_river_report(&records));
                    }
                }
                None => {
                    for river in snapshot.rivers() {
                        println!("{river}");
                    }
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}

async fn build_refresher(config: &Config) -> Result<(Refresher, Arc<SqliteRepository>)> {
    config.validate()?;
    let repo = Arc::new(SqliteRepository::open(&config.storage.database_path).await?);
    let client = http::create_async_client(&config.http)?;
    let sources = SourceSet::from_config(config, &client)?;
    Ok((Refresher::new(sources, repo.clone()), repo))
}

/// Refresh every `period` until `shutdown` resolves, abandoning a refresh in flight.
async fn watch<F>(refresher: &Refresher, period: Duration, shutdown: F)
where
    F: Future,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }
        tokio::select! {
            result = run_refresh(refresher) => {
                if let Err(e) = result {
                    log::error!("Refresh failed: {e}");
                }
            }
            _ = &mut shutdown => break,
        }
    }
    log::info!("Interrupted, shutting down");
}

async fn run_refresh(refresher: &Refresher) -> Result<()> {
    match refresher.refresh().await? {
        RefreshOutcome::Completed(report) => {
            for (source, count) in &report.source_counts {
                log::info!("  {source}: {count} records");
            }
            for (source, error) in &report.failures {
                log::warn!("  {source}: failed ({error})");
            }
            log::info!("Stored {} records", report.saved);
        }
        RefreshOutcome::Skipped => log::info!("Refresh skipped, another one is running"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vodostaj::models::RiverRecord;
    use vodostaj::services::RecordSource;

    struct Stalled;

    #[async_trait]
    impl RecordSource for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn fetch(&self) -> Result<Vec<RiverRecord>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_watch_stops_during_refresh() {
        let repo = Arc::new(SqliteRepository::open_memory().await.unwrap());
        let sources = SourceSet {
            primary: Arc::new(Stalled),
            secondary: Vec::new(),
        };
        let refresher = Refresher::new(sources, repo);

        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            watch(&refresher, Duration::from_secs(3600), shutdown),
        )
        .await;
        assert!(stopped.is_ok());
    }
}
