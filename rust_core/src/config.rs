//! Environment-driven service configuration.
//!
//! All settings are read once at startup into an explicit [`SyncConfig`]
//! that is passed by reference; nothing downstream touches the environment.
//! Credential problems are reported here, before any network call is made.

use crate::types::League;
use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::env;

/// Vendors the service can pull from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    SportsData,
    MySportsFeeds,
    Espn,
    ApiSports,
}

impl Provider {
    pub fn from_key(key: &str) -> Option<Provider> {
        match key.trim().to_lowercase().as_str() {
            "sportsdata" | "sportsdataio" => Some(Provider::SportsData),
            "mysportsfeeds" | "msf" => Some(Provider::MySportsFeeds),
            "espn" => Some(Provider::Espn),
            "apisports" | "api-sports" => Some(Provider::ApiSports),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Provider::SportsData => "sportsdata",
            Provider::MySportsFeeds => "mysportsfeeds",
            Provider::Espn => "espn",
            Provider::ApiSports => "apisports",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    /// SportsData.io keys per league, with an optional catch-all default.
    pub sportsdata_keys: HashMap<League, String>,
    pub mysportsfeeds_key: Option<String>,
    pub apisports_key: Option<String>,
    pub leagues: Vec<League>,
    pub providers: Vec<Provider>,
    pub season: i32,
    pub upsert_batch_size: usize,
    /// Cap on players pulled per league, mostly for smoke runs.
    pub max_players: Option<usize>,
    pub sync_games: bool,
    pub sync_stats: bool,
    pub sync_odds: bool,
}

/// First non-empty value among several environment names. The legacy
/// deployments used inconsistent names, so most settings have aliases.
fn env_any(names: &[&str]) -> Option<String> {
    for name in names {
        if let Ok(v) = env::var(name) {
            let v = v.trim().to_string();
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

/// Reject keys still carrying template values from an example .env.
fn is_placeholder(value: &str) -> bool {
    let v = value.to_lowercase();
    v.contains("your_") || v.contains("changeme") || v.contains("change_me") || v == "placeholder"
}

fn env_key(names: &[&str]) -> Result<Option<String>> {
    match env_any(names) {
        Some(v) if is_placeholder(&v) => {
            bail!("{} is set to a placeholder value, replace it with a real key", names[0])
        }
        other => Ok(other),
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env_any(&["DATABASE_URL", "SUPABASE_DB_URL"])
            .context("DATABASE_URL (or SUPABASE_DB_URL) must be set")?;
        if is_placeholder(&database_url) {
            bail!("DATABASE_URL is set to a placeholder value");
        }

        let leagues = match env_any(&["SYNC_LEAGUES"]) {
            Some(csv) => {
                let mut out = Vec::new();
                for part in csv.split(',') {
                    let league = League::from_key(part)
                        .with_context(|| format!("unknown league '{}' in SYNC_LEAGUES", part.trim()))?;
                    out.push(league);
                }
                if out.is_empty() {
                    bail!("SYNC_LEAGUES is set but empty");
                }
                out
            }
            None => vec![League::MLB],
        };

        let providers = match env_any(&["SYNC_PROVIDERS"]) {
            Some(csv) => {
                let mut out = Vec::new();
                for part in csv.split(',') {
                    let provider = Provider::from_key(part).with_context(|| {
                        format!("unknown provider '{}' in SYNC_PROVIDERS", part.trim())
                    })?;
                    out.push(provider);
                }
                out
            }
            None => vec![Provider::SportsData],
        };

        let default_sd_key = env_key(&["SPORTSDATA_API_KEY", "PUBLIC_SPORTSDATA_API_KEY"])?;
        let mut sportsdata_keys = HashMap::new();
        for league in League::all() {
            let var = format!("SPORTSDATA_{}_KEY", league.key().to_uppercase());
            let key = match env_key(&[var.as_str()])? {
                Some(k) => Some(k),
                None => default_sd_key.clone(),
            };
            if let Some(k) = key {
                sportsdata_keys.insert(league, k);
            }
        }
        if providers.contains(&Provider::SportsData) {
            for league in &leagues {
                if !sportsdata_keys.contains_key(league) {
                    bail!(
                        "no SportsData.io key for {}: set SPORTSDATA_{}_KEY or SPORTSDATA_API_KEY",
                        league,
                        league.key().to_uppercase()
                    );
                }
            }
        }

        let mysportsfeeds_key =
            env_key(&["MY_SPORTS_FEEDS_API_KEY", "MYSPORTSFEEDS_API_KEY", "MSF_API_KEY"])?;
        if providers.contains(&Provider::MySportsFeeds) && mysportsfeeds_key.is_none() {
            bail!("MY_SPORTS_FEEDS_API_KEY must be set for the mysportsfeeds provider");
        }

        let apisports_key = env_key(&["APISPORTS_API_KEY", "API_SPORTS_KEY"])?;
        if providers.contains(&Provider::ApiSports) && apisports_key.is_none() {
            bail!("APISPORTS_API_KEY must be set for the apisports provider");
        }

        let season = match env_any(&["SEASON", "SYNC_SEASON"]) {
            Some(v) => v.parse::<i32>().with_context(|| format!("invalid SEASON '{}'", v))?,
            None => Utc::now().year(),
        };

        let upsert_batch_size = match env_any(&["UPSERT_BATCH_SIZE"]) {
            Some(v) => v
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("invalid UPSERT_BATCH_SIZE '{}'", v))?,
            None => 50,
        };

        let max_players = match env_any(&["MAX_PLAYERS"]) {
            Some(v) => Some(
                v.parse::<usize>()
                    .with_context(|| format!("invalid MAX_PLAYERS '{}'", v))?,
            ),
            None => None,
        };

        Ok(Self {
            database_url,
            sportsdata_keys,
            mysportsfeeds_key,
            apisports_key,
            leagues,
            providers,
            season,
            upsert_batch_size,
            max_players,
            sync_games: env_bool("SYNC_GAMES", true),
            sync_stats: env_bool("SYNC_STATS", true),
            sync_odds: env_bool("SYNC_ODDS", false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate shared process state, so each one uses its own
    // variable names rather than the real ones.

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder("your_api_key_here"));
        assert!(is_placeholder("CHANGEME"));
        assert!(is_placeholder("placeholder"));
        assert!(!is_placeholder("a1b2c3d4"));
    }

    #[test]
    fn test_env_any_prefers_first_set() {
        env::set_var("TEST_SYNC_ALIAS_B", "beta");
        assert_eq!(
            env_any(&["TEST_SYNC_ALIAS_A", "TEST_SYNC_ALIAS_B"]),
            Some("beta".to_string())
        );
        env::set_var("TEST_SYNC_ALIAS_A", "alpha");
        assert_eq!(
            env_any(&["TEST_SYNC_ALIAS_A", "TEST_SYNC_ALIAS_B"]),
            Some("alpha".to_string())
        );
        env::remove_var("TEST_SYNC_ALIAS_A");
        env::remove_var("TEST_SYNC_ALIAS_B");
    }

    #[test]
    fn test_env_key_rejects_placeholder() {
        env::set_var("TEST_SYNC_PLACEHOLDER_KEY", "your_key_here");
        assert!(env_key(&["TEST_SYNC_PLACEHOLDER_KEY"]).is_err());
        env::remove_var("TEST_SYNC_PLACEHOLDER_KEY");
    }

    #[test]
    fn test_provider_keys() {
        assert_eq!(Provider::from_key("sportsdata"), Some(Provider::SportsData));
        assert_eq!(Provider::from_key("MSF"), Some(Provider::MySportsFeeds));
        assert_eq!(Provider::from_key("api-sports"), Some(Provider::ApiSports));
        assert_eq!(Provider::from_key("oddsapi"), None);
    }
}
