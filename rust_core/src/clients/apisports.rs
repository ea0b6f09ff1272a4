//! API-SPORTS baseball client (MLB only).
//!
//! All endpoints wrap their payload in a `{"response": [...]}` envelope and
//! authenticate with the `x-apisports-key` header. Coverage here is thin by
//! design: team and roster shells to backfill gaps in the primary vendors.

use crate::http::{BackoffPolicy, RateLimitedClient};
use crate::types::{League, PlayerDraft, PlayerRow, TeamRow, Transformed};
use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const BASE_URL: &str = "https://v1.baseball.api-sports.io";
const SOURCE: &str = "apisports";
/// API-SPORTS league id for MLB.
const MLB_LEAGUE_ID: u32 = 1;

pub struct ApiSportsClient {
    http: RateLimitedClient,
    season: i32,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AsTeam {
    id: Option<i64>,
    name: Option<String>,
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsPlayer {
    id: Option<i64>,
    name: Option<String>,
    position: Option<String>,
}

impl ApiSportsClient {
    pub fn new(api_key: &str, season: i32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-apisports-key",
            HeaderValue::from_str(api_key).context("invalid API-SPORTS key")?,
        );
        let http = RateLimitedClient::new(
            BASE_URL,
            Duration::from_secs(1),
            BackoffPolicy::default(),
            headers,
        )
        .context("failed to build API-SPORTS client")?;
        Ok(Self { http, season })
    }

    async fn fetch_envelope<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let value = self
            .http
            .fetch(endpoint, params)
            .await
            .with_context(|| format!("API-SPORTS fetch {} failed", endpoint))?;
        let envelope: Envelope<T> =
            serde_json::from_value(value).with_context(|| format!("unexpected payload from {}", endpoint))?;
        Ok(envelope.response)
    }
}

fn transform_team(t: AsTeam) -> Transformed<TeamRow> {
    let Some(id) = t.id else {
        return Transformed::Skip("team missing id");
    };
    let Some(name) = t.name.filter(|n| !n.is_empty()) else {
        return Transformed::Skip("team missing name");
    };
    let (city, _) = crate::transform::split_city_name(&name);
    Transformed::Row(TeamRow {
        external_id: id.to_string(),
        league_id: None,
        name,
        city: (!city.is_empty()).then_some(city),
        abbreviation: None,
        primary_color: None,
        secondary_color: None,
        logo_url: t.logo,
        venue_name: None,
        venue_city: None,
        venue_state: None,
        venue_capacity: None,
        is_active: true,
        source_system: SOURCE.to_string(),
    })
}

fn transform_player(p: AsPlayer, team_id: i64, team_name: &str) -> Transformed<PlayerDraft> {
    let Some(id) = p.id else {
        return Transformed::Skip("player missing id");
    };
    let Some(name) = p.name.filter(|n| !n.trim().is_empty()) else {
        return Transformed::Skip("player missing name");
    };
    let (first, last) = match name.rsplit_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (String::new(), name.clone()),
    };
    Transformed::Row(PlayerDraft {
        row: PlayerRow {
            external_id: id.to_string(),
            first_name: first,
            last_name: last,
            full_name: name,
            primary_position: p.position,
            jersey_number: None,
            height_inches: None,
            weight_lbs: None,
            birth_date: None,
            birth_city: None,
            birth_country: None,
            bat_side: None,
            throw_hand: None,
            photo_url: None,
            roster_status: None,
            current_injury: None,
            is_active: None,
            team_id: None,
            source_system: SOURCE.to_string(),
        },
        team_external_id: Some(team_id.to_string()),
        team_name: Some(team_name.to_string()),
    })
}

#[async_trait::async_trait]
impl super::SportsProvider for ApiSportsClient {
    fn name(&self) -> &'static str {
        "apisports"
    }

    async fn fetch_teams(&self, league: League) -> Result<Vec<Transformed<TeamRow>>> {
        if league != League::MLB {
            bail!("API-SPORTS client only covers MLB, got {}", league);
        }
        let teams: Vec<AsTeam> = self
            .fetch_envelope(
                "teams",
                &[
                    ("league", MLB_LEAGUE_ID.to_string()),
                    ("season", self.season.to_string()),
                ],
            )
            .await?;
        info!("fetched {} MLB teams from API-SPORTS", teams.len());
        Ok(teams.into_iter().map(transform_team).collect())
    }

    async fn fetch_players(&self, league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
        if league != League::MLB {
            bail!("API-SPORTS client only covers MLB, got {}", league);
        }
        let teams: Vec<AsTeam> = self
            .fetch_envelope(
                "teams",
                &[
                    ("league", MLB_LEAGUE_ID.to_string()),
                    ("season", self.season.to_string()),
                ],
            )
            .await?;

        let mut players = Vec::new();
        for team in teams {
            let (Some(team_id), Some(team_name)) = (team.id, team.name.as_deref()) else {
                continue;
            };
            let roster: Result<Vec<AsPlayer>> = self
                .fetch_envelope(
                    "players",
                    &[
                        ("team", team_id.to_string()),
                        ("season", self.season.to_string()),
                    ],
                )
                .await;
            match roster {
                Ok(roster) => {
                    for p in roster {
                        players.push(transform_player(p, team_id, team_name));
                    }
                }
                Err(e) => warn!("API-SPORTS roster fetch for team {} failed: {}", team_id, e),
            }
        }
        Ok(players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_team_extracts_city() {
        let team: AsTeam = serde_json::from_value(serde_json::json!({
            "id": 5, "name": "Boston Red Sox", "logo": "https://img/bos.png"
        }))
        .unwrap();
        let row = transform_team(team).row().unwrap();
        assert_eq!(row.external_id, "5");
        assert_eq!(row.city.as_deref(), Some("Boston"));
        assert_eq!(row.logo_url.as_deref(), Some("https://img/bos.png"));
    }

    #[test]
    fn test_transform_player_name_split() {
        let p: AsPlayer = serde_json::from_value(serde_json::json!({
            "id": 10, "name": "Rafael Devers", "position": "3B"
        }))
        .unwrap();
        let draft = transform_player(p, 5, "Boston Red Sox").row().unwrap();
        assert_eq!(draft.row.first_name, "Rafael");
        assert_eq!(draft.row.last_name, "Devers");
        assert_eq!(draft.team_external_id.as_deref(), Some("5"));
    }

    #[test]
    fn test_transform_player_skips_anonymous() {
        let p: AsPlayer = serde_json::from_value(serde_json::json!({ "id": 10 })).unwrap();
        assert!(transform_player(p, 5, "Team").is_skip());
    }
}
