//! MySportsFeeds v2.1 client.
//!
//! Auth is HTTP Basic with the API key as username and the literal
//! `MYSPORTSFEEDS` as password. The player list is limit/offset paginated;
//! MSF meters aggressively, so pacing sits at one request per 3 seconds.

use crate::http::{BackoffPolicy, RateLimitedClient};
use crate::paginate::{paginate, PageOptions};
use crate::transform::{normalize_date, parse_height};
use crate::types::{League, PlayerDraft, PlayerRow, SeasonStatDraft, TeamRow, Transformed};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;

const BASE_URL: &str = "https://api.mysportsfeeds.com/v2.1/pull";
const SOURCE: &str = "mysportsfeeds";
const PAGE_SIZE: usize = 100;

pub struct MySportsFeedsClient {
    http: RateLimitedClient,
    max_players: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MsfPlayersPage {
    #[serde(default)]
    players: Vec<MsfPlayerEntry>,
}

#[derive(Debug, Deserialize)]
struct MsfPlayerEntry {
    player: MsfPlayer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsfPlayer {
    id: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    primary_position: Option<String>,
    jersey_number: Option<i32>,
    height: Option<String>,
    // String in some feeds, a bare number in others.
    weight: Option<Value>,
    birth_date: Option<String>,
    birth_city: Option<String>,
    birth_country: Option<String>,
    official_image_src: Option<String>,
    current_roster_status: Option<String>,
    current_injury: Option<Value>,
    current_team: Option<MsfTeamRef>,
    handedness: Option<MsfHandedness>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsfTeamRef {
    id: Option<i64>,
    abbreviation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsfHandedness {
    bats: Option<String>,
    throws: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsfStatsPage {
    #[serde(default)]
    player_stats_totals: Vec<MsfStatEntry>,
}

#[derive(Debug, Deserialize)]
struct MsfStatEntry {
    player: MsfStatPlayerRef,
    team: Option<MsfTeamRef>,
    #[serde(default)]
    stats: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct MsfStatPlayerRef {
    id: Option<i64>,
}

impl MySportsFeedsClient {
    pub fn new(api_key: &str, max_players: Option<usize>) -> Result<Self> {
        let token = STANDARD.encode(format!("{}:MYSPORTSFEEDS", api_key));
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", token))
                .context("invalid MySportsFeeds key")?,
        );
        let http = RateLimitedClient::new(
            BASE_URL,
            Duration::from_secs(3),
            BackoffPolicy::default(),
            headers,
        )
        .context("failed to build MySportsFeeds client")?;
        Ok(Self { http, max_players })
    }

    async fn fetch_player_page(
        &self,
        league: League,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MsfPlayerEntry>> {
        let endpoint = format!("{}/players.json", league.key());
        let value = self
            .http
            .fetch(
                &endpoint,
                &[("limit", limit.to_string()), ("offset", offset.to_string())],
            )
            .await
            .with_context(|| format!("MySportsFeeds fetch {} failed", endpoint))?;
        let page: MsfPlayersPage =
            serde_json::from_value(value).context("unexpected players.json payload")?;
        Ok(page.players)
    }
}

/// MSF names cross-year seasons by both years: the NBA season ending in
/// 2025 is `2024-2025-regular`, while single-year leagues use `2025-regular`.
/// The configured season is the ending year.
fn season_slug(league: League, season: i32) -> String {
    match league {
        League::NBA | League::NHL => format!("{}-{}-regular", season - 1, season),
        _ => format!("{}-regular", season),
    }
}

fn parse_msf_weight(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().map(|i| i as i32),
        Value::String(s) => crate::transform::parse_weight(s),
        _ => None,
    }
}

fn transform_player(entry: MsfPlayerEntry) -> Transformed<PlayerDraft> {
    let p = entry.player;
    let Some(id) = p.id else {
        return Transformed::Skip("player missing id");
    };
    let first = p.first_name.unwrap_or_default();
    let last = p.last_name.unwrap_or_default();
    if first.is_empty() && last.is_empty() {
        return Transformed::Skip("player missing name");
    }
    let full_name = format!("{} {}", first, last).trim().to_string();

    let (bats, throws) = match p.handedness {
        Some(h) => (h.bats, h.throws),
        None => (None, None),
    };
    let (team_external_id, team_name) = match p.current_team {
        Some(t) => (t.id.map(|id| id.to_string()), t.abbreviation),
        None => (None, None),
    };
    let roster_status = p.current_roster_status;
    let is_active = roster_status.as_deref().map(|s| s.contains("ROSTER"));

    Transformed::Row(PlayerDraft {
        row: PlayerRow {
            external_id: id.to_string(),
            first_name: first,
            last_name: last,
            full_name,
            primary_position: p.primary_position,
            jersey_number: p.jersey_number,
            height_inches: p.height.as_deref().and_then(parse_height),
            weight_lbs: p.weight.as_ref().and_then(parse_msf_weight),
            birth_date: p.birth_date.as_deref().and_then(normalize_date),
            birth_city: p.birth_city,
            birth_country: p.birth_country,
            bat_side: bats,
            throw_hand: throws,
            photo_url: p.official_image_src,
            roster_status,
            current_injury: p.current_injury.filter(|v| !v.is_null()),
            is_active,
            team_id: None,
            source_system: SOURCE.to_string(),
        },
        team_external_id,
        team_name,
    })
}

/// Flatten MSF's nested stat categories (`{"rebounds": {"reb": 5.0}}`) into
/// one level, then route rate metrics into the advanced document.
fn flatten_stats(stats: Map<String, Value>) -> (Value, Value) {
    let mut flat = Map::new();
    for (category, value) in stats {
        match value {
            Value::Object(inner) => {
                for (key, v) in inner {
                    if v.is_number() {
                        flat.insert(key, v);
                    }
                }
            }
            v if v.is_number() => {
                flat.insert(category, v);
            }
            _ => {}
        }
    }

    let mut plain = Map::new();
    let mut advanced = Map::new();
    for (key, v) in flat {
        let lower = key.to_lowercase();
        if lower.ends_with("pct") || lower.contains("percentage") || lower.contains("rating") {
            advanced.insert(key, v);
        } else {
            plain.insert(key, v);
        }
    }
    (Value::Object(plain), Value::Object(advanced))
}

fn transform_season_stat(entry: MsfStatEntry, season: i32) -> Option<SeasonStatDraft> {
    let player_id = entry.player.id?;
    let team_id = entry.team.and_then(|t| t.id)?;
    let (stats, advanced_stats) = flatten_stats(entry.stats);
    let games_played = stats
        .get("gamesPlayed")
        .and_then(Value::as_i64)
        .map(|v| v as i32);
    let minutes_played = stats.get("minSeconds").and_then(Value::as_f64).map(|s| s / 60.0);
    Some(SeasonStatDraft {
        player_external_id: player_id.to_string(),
        team_external_id: team_id.to_string(),
        season,
        games_played,
        games_started: None,
        minutes_played,
        stats,
        advanced_stats,
    })
}

#[async_trait::async_trait]
impl super::SportsProvider for MySportsFeedsClient {
    fn name(&self) -> &'static str {
        "mysportsfeeds"
    }

    /// MSF has no team list feed on the core plan; teams come from another
    /// vendor and MSF players attach by team reference.
    async fn fetch_teams(&self, _league: League) -> Result<Vec<Transformed<TeamRow>>> {
        Ok(Vec::new())
    }

    async fn fetch_players(&self, league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
        let opts = PageOptions {
            batch_size: PAGE_SIZE,
            max_items: self.max_players,
            page_delay: Duration::from_secs(1),
            start_offset: 0,
        };
        let entries = paginate(
            |limit, offset| self.fetch_player_page(league, limit, offset),
            &opts,
        )
        .await?;
        info!("fetched {} {} players from MySportsFeeds", entries.len(), league);
        Ok(entries.into_iter().map(transform_player).collect())
    }

    async fn fetch_season_stats(&self, league: League, season: i32) -> Result<Vec<SeasonStatDraft>> {
        let endpoint = format!(
            "{}/{}/player_stats_totals.json",
            league.key(),
            season_slug(league, season)
        );
        let value = self
            .http
            .fetch(&endpoint, &[])
            .await
            .with_context(|| format!("MySportsFeeds fetch {} failed", endpoint))?;
        let page: MsfStatsPage =
            serde_json::from_value(value).context("unexpected player_stats_totals payload")?;
        Ok(page
            .player_stats_totals
            .into_iter()
            .filter_map(|e| transform_season_stat(e, season))
            .collect())
    }
}
