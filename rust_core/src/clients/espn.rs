//! ESPN public site API client.
//!
//! No auth and no stable cross-vendor ids, so teams are keyed by ESPN's own
//! team id and roster players carry the team display name for fuzzy
//! resolution. The payloads are deeply nested and loosely specified, so
//! this client walks `serde_json::Value` instead of declaring structs.

use crate::http::{BackoffPolicy, RateLimitedClient};
use crate::transform::{normalize_date, parse_height, parse_weight};
use crate::types::{League, PlayerDraft, PlayerRow, TeamRow, Transformed};
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports";
const SOURCE: &str = "espn";
/// Rosters in flight at once; the shared client still paces each request.
const ROSTER_CONCURRENCY: usize = 4;

pub struct EspnClient {
    http: RateLimitedClient,
}

impl EspnClient {
    pub fn new() -> Result<Self> {
        let http = RateLimitedClient::new(
            BASE_URL,
            Duration::from_secs(1),
            BackoffPolicy::default(),
            HeaderMap::new(),
        )
        .context("failed to build ESPN client")?;
        Ok(Self { http })
    }

    async fn fetch_team_nodes(&self, league: League) -> Result<Vec<Value>> {
        let (sport, league_path) = league.espn_path();
        let endpoint = format!("{}/{}/teams", sport, league_path);
        let data = self
            .http
            .fetch(&endpoint, &[])
            .await
            .with_context(|| format!("ESPN fetch {} failed", endpoint))?;

        let mut nodes = Vec::new();
        let leagues = data["sports"]
            .as_array()
            .and_then(|sports| sports.first())
            .and_then(|s| s["leagues"].as_array())
            .cloned()
            .unwrap_or_default();
        for league_node in leagues {
            if let Some(teams) = league_node["teams"].as_array() {
                for wrapper in teams {
                    if !wrapper["team"].is_null() {
                        nodes.push(wrapper["team"].clone());
                    }
                }
            }
        }
        Ok(nodes)
    }
}

fn str_field(node: &Value, key: &str) -> Option<String> {
    node[key].as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn transform_team(node: &Value) -> Transformed<TeamRow> {
    let Some(id) = str_field(node, "id") else {
        return Transformed::Skip("team missing id");
    };
    let Some(name) = str_field(node, "displayName") else {
        return Transformed::Skip("team missing displayName");
    };
    let logo_url = node["logos"]
        .as_array()
        .and_then(|logos| logos.first())
        .and_then(|l| l["href"].as_str())
        .map(str::to_string);

    Transformed::Row(TeamRow {
        external_id: id,
        league_id: None,
        name,
        city: str_field(node, "location"),
        abbreviation: str_field(node, "abbreviation"),
        primary_color: str_field(node, "color"),
        secondary_color: str_field(node, "alternateColor"),
        logo_url,
        venue_name: str_field(&node["venue"], "fullName"),
        venue_city: None,
        venue_state: None,
        venue_capacity: None,
        is_active: node["isActive"].as_bool().unwrap_or(true),
        source_system: SOURCE.to_string(),
    })
}

fn transform_athlete(node: &Value, team_id: &str, team_name: &str) -> Transformed<PlayerDraft> {
    let Some(id) = str_field(node, "id") else {
        return Transformed::Skip("athlete missing id");
    };
    let first = str_field(node, "firstName").unwrap_or_default();
    let last = str_field(node, "lastName").unwrap_or_default();
    let full_name = str_field(node, "fullName")
        .unwrap_or_else(|| format!("{} {}", first, last).trim().to_string());
    if full_name.is_empty() {
        return Transformed::Skip("athlete missing name");
    }

    // "height" is inches as a number; "displayHeight" is the `6' 4"` string.
    let height_inches = node["height"]
        .as_i64()
        .map(|h| h as i32)
        .or_else(|| str_field(node, "displayHeight").as_deref().and_then(parse_height));
    let weight_lbs = node["weight"]
        .as_i64()
        .map(|w| w as i32)
        .or_else(|| str_field(node, "displayWeight").as_deref().and_then(parse_weight));

    let (birth_city, birth_country) = (
        str_field(&node["birthPlace"], "city"),
        str_field(&node["birthPlace"], "country"),
    );
    let jersey_number = str_field(node, "jersey").and_then(|j| j.parse().ok());

    Transformed::Row(PlayerDraft {
        row: PlayerRow {
            external_id: id,
            first_name: first,
            last_name: last,
            full_name,
            primary_position: str_field(&node["position"], "abbreviation"),
            jersey_number,
            height_inches,
            weight_lbs,
            birth_date: str_field(node, "dateOfBirth").as_deref().and_then(normalize_date),
            birth_city,
            birth_country,
            bat_side: None,
            throw_hand: None,
            photo_url: str_field(&node["headshot"], "href"),
            roster_status: None,
            current_injury: None,
            is_active: node["active"].as_bool(),
            team_id: None,
            source_system: SOURCE.to_string(),
        },
        team_external_id: Some(team_id.to_string()),
        team_name: Some(team_name.to_string()),
    })
}

/// Roster athletes arrive either flat or grouped by position
/// (`athletes[].items[]`); accept both.
fn roster_athletes(data: &Value) -> Vec<Value> {
    let Some(groups) = data["athletes"].as_array() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for group in groups {
        if let Some(items) = group["items"].as_array() {
            out.extend(items.iter().cloned());
        } else {
            out.push(group.clone());
        }
    }
    out
}

#[async_trait::async_trait]
impl super::SportsProvider for EspnClient {
    fn name(&self) -> &'static str {
        "espn"
    }

    async fn fetch_teams(&self, league: League) -> Result<Vec<Transformed<TeamRow>>> {
        let nodes = self.fetch_team_nodes(league).await?;
        info!("fetched {} {} teams from ESPN", nodes.len(), league);
        Ok(nodes.iter().map(transform_team).collect())
    }

    async fn fetch_players(&self, league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
        let (sport, league_path) = league.espn_path();
        let teams = self.fetch_team_nodes(league).await?;

        let refs: Vec<(String, String)> = teams
            .iter()
            .filter_map(|team| {
                let id = team["id"].as_str()?.to_string();
                let name = team["displayName"].as_str().unwrap_or_default().to_string();
                Some((id, name))
            })
            .collect();

        let rosters = stream::iter(refs)
            .map(|(team_id, team_name)| async move {
                let endpoint = format!("{}/{}/teams/{}/roster", sport, league_path, team_id);
                let result = self.http.fetch(&endpoint, &[]).await;
                (team_id, team_name, result)
            })
            .buffer_unordered(ROSTER_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut players = Vec::new();
        for (team_id, team_name, result) in rosters {
            match result {
                Ok(data) => {
                    for athlete in roster_athletes(&data) {
                        players.push(transform_athlete(&athlete, &team_id, &team_name));
                    }
                }
                Err(e) => warn!("roster fetch for {} team {} failed: {}", league, team_id, e),
            }
        }
        info!("fetched {} {} roster players from ESPN", players.len(), league);
        Ok(players)
    }
}
