//! Sports data sync service.
//!
//! One-shot process meant to run from cron or a scheduler: loads config
//! from the environment, connects to Postgres, then runs the best-effort
//! sync pipeline for each configured league and provider. Credential and
//! config problems exit non-zero before any network call; everything after
//! that is logged and the process exits 0.

use anyhow::{Context, Result};
use astrobet_rust_core::clients::apisports::ApiSportsClient;
use astrobet_rust_core::clients::espn::EspnClient;
use astrobet_rust_core::clients::mysportsfeeds::MySportsFeedsClient;
use astrobet_rust_core::clients::sportsdata::SportsDataClient;
use astrobet_rust_core::{
    create_pool, DbPoolConfig, League, PgStore, Provider, SportsProvider, SyncConfig, SyncOptions,
    SyncPipeline,
};
use chrono::{Duration, Utc};
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn build_provider(
    kind: Provider,
    league: League,
    config: &SyncConfig,
) -> Result<Option<Box<dyn SportsProvider>>> {
    match kind {
        Provider::SportsData => {
            let key = config
                .sportsdata_keys
                .get(&league)
                .context("missing SportsData.io key")?;
            Ok(Some(Box::new(SportsDataClient::new(key)?)))
        }
        Provider::MySportsFeeds => {
            let key = config
                .mysportsfeeds_key
                .as_deref()
                .context("missing MySportsFeeds key")?;
            Ok(Some(Box::new(MySportsFeedsClient::new(
                key,
                config.max_players,
            )?)))
        }
        Provider::Espn => Ok(Some(Box::new(EspnClient::new()?))),
        Provider::ApiSports => {
            if league != League::MLB {
                // API-SPORTS coverage is baseball-only here.
                return Ok(None);
            }
            let key = config
                .apisports_key
                .as_deref()
                .context("missing API-SPORTS key")?;
            Ok(Some(Box::new(ApiSportsClient::new(key, config.season)?)))
        }
    }
}

async fn run() -> Result<()> {
    let config = SyncConfig::from_env()?;
    info!(
        "starting sync: leagues={:?} providers={:?} season={}",
        config.leagues.iter().map(|l| l.key()).collect::<Vec<_>>(),
        config.providers.iter().map(|p| p.key()).collect::<Vec<_>>(),
        config.season
    );

    let pool = create_pool(&config.database_url, &DbPoolConfig::from_env()).await?;
    let store = PgStore::new(pool, config.upsert_batch_size);

    // Pregame odds are only meaningful for the next day or two.
    let today = Utc::now().date_naive();
    let odds_dates = vec![today, today + Duration::days(1)];

    let opts = SyncOptions {
        season: config.season,
        sync_games: config.sync_games,
        sync_stats: config.sync_stats,
        sync_odds: config.sync_odds,
        odds_dates,
    };

    let mut total_errors = 0usize;
    for &league in &config.leagues {
        for &kind in &config.providers {
            let provider = match build_provider(kind, league, &config) {
                Ok(Some(p)) => p,
                Ok(None) => {
                    info!("provider {} does not cover {}, skipping", kind.key(), league);
                    continue;
                }
                Err(e) => {
                    // Keys were validated at startup; this is a construction
                    // failure worth surfacing but not worth killing the run.
                    error!("cannot build provider {} for {}: {:#}", kind.key(), league, e);
                    total_errors += 1;
                    continue;
                }
            };

            let pipeline = SyncPipeline::new(provider.as_ref(), &store);
            match pipeline.run(league, &opts).await {
                Ok(report) => total_errors += report.total_errors(),
                Err(e) => {
                    error!("sync of {} via {} aborted: {:#}", league, kind.key(), e);
                    total_errors += 1;
                }
            }
        }
    }

    if total_errors > 0 {
        warn!("sync finished with {} recorded errors", total_errors);
    } else {
        info!("sync finished cleanly");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("fatal: {:#}", e);
        std::process::exit(1);
    }
}
