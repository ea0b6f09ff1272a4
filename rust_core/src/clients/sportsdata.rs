//! SportsData.io client.
//!
//! Covers teams, players (with a per-team roster fallback when the bulk
//! endpoint is unavailable on the subscription), games, season stats and
//! pregame odds. Auth is the `Ocp-Apim-Subscription-Key` header; keys are
//! per-league on most plans.

use crate::http::{BackoffPolicy, RateLimitedClient};
use crate::transform::{normalize_date, normalize_datetime};
use crate::types::{
    GameDraft, GameOddsDraft, League, PlayerDraft, PlayerRow, SeasonStatDraft, TeamRow, Transformed,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

const BASE_URL: &str = "https://api.sportsdata.io/v3";
const SOURCE: &str = "sportsdata";

/// Metric-name fragments routed into the `advanced_stats` JSON document
/// instead of the raw counter document.
const ADVANCED_FRAGMENTS: &[&str] = &[
    "onbaseplusslugging",
    "ballsinplay",
    "babip",
    "woba",
    "wrc",
    "abovereplacement",
    "rating",
    "efficiency",
    "usage",
    "percentage",
];

pub struct SportsDataClient {
    http: RateLimitedClient,
}

#[derive(Debug, Deserialize)]
struct SdStadium {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "City")]
    city: Option<String>,
    #[serde(rename = "State")]
    state: Option<String>,
    #[serde(rename = "Capacity")]
    capacity: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SdTeam {
    #[serde(rename = "TeamID")]
    team_id: Option<i64>,
    #[serde(rename = "Key")]
    key: Option<String>,
    #[serde(rename = "City")]
    city: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Active")]
    active: Option<bool>,
    #[serde(rename = "PrimaryColor")]
    primary_color: Option<String>,
    #[serde(rename = "SecondaryColor")]
    secondary_color: Option<String>,
    #[serde(rename = "WikipediaLogoUrl")]
    logo_url: Option<String>,
    #[serde(rename = "StadiumDetails", alias = "Stadium")]
    stadium: Option<SdStadium>,
}

#[derive(Debug, Deserialize)]
struct SdPlayer {
    #[serde(rename = "PlayerID")]
    player_id: Option<i64>,
    #[serde(rename = "FirstName")]
    first_name: Option<String>,
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "Position")]
    position: Option<String>,
    #[serde(rename = "Jersey")]
    jersey: Option<i32>,
    // String in some feeds, inches as a number in others.
    #[serde(rename = "Height")]
    height: Option<Value>,
    #[serde(rename = "Weight")]
    weight: Option<Value>,
    #[serde(rename = "BirthDate")]
    birth_date: Option<String>,
    #[serde(rename = "BirthCity")]
    birth_city: Option<String>,
    #[serde(rename = "BirthCountry")]
    birth_country: Option<String>,
    #[serde(rename = "BatHand")]
    bat_hand: Option<String>,
    #[serde(rename = "ThrowHand")]
    throw_hand: Option<String>,
    #[serde(rename = "PhotoUrl")]
    photo_url: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "InjuryStatus")]
    injury_status: Option<String>,
    #[serde(rename = "InjuryNotes")]
    injury_notes: Option<String>,
    #[serde(rename = "TeamID")]
    team_id: Option<i64>,
    #[serde(rename = "Team")]
    team_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SdGame {
    #[serde(rename = "GameID", alias = "GameId", alias = "ScoreID")]
    game_id: Option<i64>,
    #[serde(rename = "Season")]
    season: Option<i32>,
    #[serde(rename = "SeasonType")]
    season_type: Option<i32>,
    #[serde(rename = "DateTime", alias = "Day")]
    date_time: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "HomeTeamID", alias = "HomeTeamId")]
    home_team_id: Option<i64>,
    #[serde(rename = "AwayTeamID", alias = "AwayTeamId")]
    away_team_id: Option<i64>,
    #[serde(rename = "HomeTeamRuns", alias = "HomeTeamScore", alias = "HomeScore")]
    home_score: Option<i32>,
    #[serde(rename = "AwayTeamRuns", alias = "AwayTeamScore", alias = "AwayScore")]
    away_score: Option<i32>,
    #[serde(rename = "HomeTeamMoneyLine")]
    home_moneyline: Option<i32>,
    #[serde(rename = "AwayTeamMoneyLine")]
    away_moneyline: Option<i32>,
    #[serde(rename = "PointSpread")]
    point_spread: Option<f64>,
    #[serde(rename = "OverUnder")]
    over_under: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SdSeasonStat {
    #[serde(rename = "PlayerID")]
    player_id: Option<i64>,
    #[serde(rename = "TeamID")]
    team_id: Option<i64>,
    #[serde(rename = "Season")]
    season: Option<i32>,
    #[serde(rename = "Games")]
    games: Option<i32>,
    #[serde(rename = "Started")]
    started: Option<i32>,
    #[serde(rename = "Minutes")]
    minutes: Option<f64>,
    /// Everything else is sport-specific; kept raw and split downstream.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SdGameOdds {
    #[serde(rename = "GameId", alias = "GameID")]
    game_id: Option<i64>,
    #[serde(rename = "PregameOdds", default)]
    pregame_odds: Vec<SdPregameOdd>,
}

#[derive(Debug, Deserialize)]
struct SdPregameOdd {
    #[serde(rename = "Sportsbook")]
    sportsbook: Option<String>,
    #[serde(rename = "HomeMoneyLine")]
    home_moneyline: Option<i32>,
    #[serde(rename = "AwayMoneyLine")]
    away_moneyline: Option<i32>,
    #[serde(rename = "HomePointSpread")]
    home_spread: Option<f64>,
    #[serde(rename = "HomePointSpreadPayout")]
    home_spread_odds: Option<i32>,
    #[serde(rename = "AwayPointSpread")]
    away_spread: Option<f64>,
    #[serde(rename = "AwayPointSpreadPayout")]
    away_spread_odds: Option<i32>,
    #[serde(rename = "OverUnder")]
    over_under: Option<f64>,
    #[serde(rename = "OverPayout")]
    over_odds: Option<i32>,
    #[serde(rename = "UnderPayout")]
    under_odds: Option<i32>,
}

impl SportsDataClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Ocp-Apim-Subscription-Key",
            HeaderValue::from_str(api_key).context("invalid SportsData.io key")?,
        );
        let http = RateLimitedClient::new(
            BASE_URL,
            Duration::from_secs(1),
            BackoffPolicy::default(),
            headers,
        )
        .context("failed to build SportsData.io client")?;
        Ok(Self { http })
    }

    async fn fetch_list<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let value = self
            .http
            .fetch(endpoint, &[])
            .await
            .with_context(|| format!("SportsData.io fetch {} failed", endpoint))?;
        serde_json::from_value(value).with_context(|| format!("unexpected payload from {}", endpoint))
    }

    /// Bulk player list, falling back to one request per team roster when
    /// the subscription rejects the bulk endpoint.
    async fn fetch_players_with_fallback(&self, league: League) -> Result<Vec<SdPlayer>> {
        let bulk = format!("{}/scores/json/Players", league.key());
        match self.fetch_list::<SdPlayer>(&bulk).await {
            Ok(players) => Ok(players),
            Err(e) => {
                warn!(
                    "bulk player fetch failed for {} ({}), walking team rosters",
                    league, e
                );
                let teams: Vec<SdTeam> = self
                    .fetch_list(&format!("{}/scores/json/AllTeams", league.key()))
                    .await?;
                let mut players = Vec::new();
                for team in teams {
                    let Some(key) = team.key else { continue };
                    let endpoint = format!("{}/scores/json/Players/{}", league.key(), key);
                    match self.fetch_list::<SdPlayer>(&endpoint).await {
                        Ok(mut roster) => players.append(&mut roster),
                        Err(e) => warn!("roster fetch for {} {} failed: {}", league, key, e),
                    }
                }
                info!("roster fallback collected {} players for {}", players.len(), league);
                Ok(players)
            }
        }
    }
}

fn parse_height_value(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().map(|i| i as i32),
        Value::String(s) => crate::transform::parse_height(s),
        _ => None,
    }
}

fn parse_weight_value(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().map(|i| i as i32),
        Value::String(s) => crate::transform::parse_weight(s),
        _ => None,
    }
}

fn transform_team(t: SdTeam) -> Transformed<TeamRow> {
    let Some(team_id) = t.team_id else {
        return Transformed::Skip("team missing TeamID");
    };
    let name = match (&t.city, &t.name) {
        (Some(city), Some(nick)) => format!("{} {}", city, nick),
        (None, Some(nick)) => nick.clone(),
        _ => return Transformed::Skip("team missing Name"),
    };
    let (venue_name, venue_city, venue_state, venue_capacity) = match t.stadium {
        Some(s) => (s.name, s.city, s.state, s.capacity),
        None => (None, None, None, None),
    };
    Transformed::Row(TeamRow {
        external_id: team_id.to_string(),
        league_id: None,
        name,
        city: t.city,
        abbreviation: t.key,
        primary_color: t.primary_color,
        secondary_color: t.secondary_color,
        logo_url: t.logo_url,
        venue_name,
        venue_city,
        venue_state,
        venue_capacity,
        is_active: t.active.unwrap_or(true),
        source_system: SOURCE.to_string(),
    })
}

fn transform_player(p: SdPlayer) -> Transformed<PlayerDraft> {
    let Some(player_id) = p.player_id else {
        return Transformed::Skip("player missing PlayerID");
    };
    let first = p.first_name.unwrap_or_default();
    let last = p.last_name.unwrap_or_default();
    if first.is_empty() && last.is_empty() {
        return Transformed::Skip("player missing name");
    }
    let full_name = format!("{} {}", first, last).trim().to_string();

    let current_injury = match (&p.injury_status, &p.injury_notes) {
        (None, None) => None,
        (status, notes) => Some(serde_json::json!({
            "status": status,
            "notes": notes,
        })),
    };

    Transformed::Row(PlayerDraft {
        row: PlayerRow {
            external_id: player_id.to_string(),
            first_name: first,
            last_name: last,
            full_name,
            primary_position: p.position,
            jersey_number: p.jersey,
            height_inches: p.height.as_ref().and_then(parse_height_value),
            weight_lbs: p.weight.as_ref().and_then(parse_weight_value),
            birth_date: p.birth_date.as_deref().and_then(normalize_date),
            birth_city: p.birth_city,
            birth_country: p.birth_country,
            bat_side: p.bat_hand,
            throw_hand: p.throw_hand,
            photo_url: p.photo_url,
            roster_status: p.status.clone(),
            current_injury,
            is_active: p.status.as_deref().map(|s| s.eq_ignore_ascii_case("active")),
            team_id: None,
            source_system: SOURCE.to_string(),
        },
        team_external_id: p.team_id.map(|id| id.to_string()),
        team_name: p.team_key,
    })
}

fn season_type_label(code: Option<i32>) -> Option<String> {
    code.map(|c| {
        match c {
            1 => "regular",
            2 => "preseason",
            3 => "postseason",
            4 => "offseason",
            5 => "allstar",
            _ => "unknown",
        }
        .to_string()
    })
}

fn transform_game(g: SdGame) -> Transformed<GameDraft> {
    let Some(game_id) = g.game_id else {
        return Transformed::Skip("game missing GameID");
    };
    let (Some(home), Some(away)) = (g.home_team_id, g.away_team_id) else {
        return Transformed::Skip("game missing team reference");
    };
    Transformed::Row(GameDraft {
        external_id: game_id.to_string(),
        season: g.season,
        season_type: season_type_label(g.season_type),
        game_time_utc: g.date_time.as_deref().and_then(normalize_datetime),
        status: g.status,
        home_team_external_id: home.to_string(),
        away_team_external_id: away.to_string(),
        home_score: g.home_score,
        away_score: g.away_score,
        home_moneyline: g.home_moneyline,
        away_moneyline: g.away_moneyline,
        spread: g.point_spread,
        over_under: g.over_under,
    })
}

/// Split the sport-specific tail of a stat record into plain counters and
/// advanced metrics. Nulls and non-numeric clutter are dropped.
fn split_stats(extra: Map<String, Value>) -> (Value, Value) {
    let mut stats = Map::new();
    let mut advanced = Map::new();
    for (key, value) in extra {
        if value.is_null() || !(value.is_number() || value.is_string()) {
            continue;
        }
        let lower = key.to_lowercase();
        if ADVANCED_FRAGMENTS.iter().any(|f| lower.contains(f)) {
            advanced.insert(key, value);
        } else if value.is_number() {
            stats.insert(key, value);
        }
    }
    (Value::Object(stats), Value::Object(advanced))
}

fn transform_season_stat(s: SdSeasonStat, season: i32) -> Option<SeasonStatDraft> {
    let player_id = s.player_id?;
    let team_id = s.team_id?;
    let (stats, advanced_stats) = split_stats(s.extra);
    Some(SeasonStatDraft {
        player_external_id: player_id.to_string(),
        team_external_id: team_id.to_string(),
        season: s.season.unwrap_or(season),
        games_played: s.games,
        games_started: s.started,
        minutes_played: s.minutes,
        stats,
        advanced_stats,
    })
}

fn transform_odds(game: SdGameOdds) -> Vec<GameOddsDraft> {
    let Some(game_id) = game.game_id else {
        return Vec::new();
    };
    game.pregame_odds
        .into_iter()
        .filter_map(|odd| {
            let sportsbook = odd.sportsbook?;
            let draft = GameOddsDraft {
                game_external_id: game_id.to_string(),
                sportsbook,
                home_moneyline: odd.home_moneyline,
                away_moneyline: odd.away_moneyline,
                home_spread: odd.home_spread,
                home_spread_odds: odd.home_spread_odds,
                away_spread: odd.away_spread,
                away_spread_odds: odd.away_spread_odds,
                over_under: odd.over_under,
                over_odds: odd.over_odds,
                under_odds: odd.under_odds,
            };
            draft.has_any_market().then_some(draft)
        })
        .collect()
}

#[async_trait::async_trait]
impl super::SportsProvider for SportsDataClient {
    fn name(&self) -> &'static str {
        "sportsdata"
    }

    async fn fetch_teams(&self, league: League) -> Result<Vec<Transformed<TeamRow>>> {
        let teams: Vec<SdTeam> = self
            .fetch_list(&format!("{}/scores/json/AllTeams", league.key()))
            .await?;
        Ok(teams.into_iter().map(transform_team).collect())
    }

    async fn fetch_players(&self, league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
        let players = self.fetch_players_with_fallback(league).await?;
        Ok(players.into_iter().map(transform_player).collect())
    }

    async fn fetch_games(&self, league: League, season: i32) -> Result<Vec<Transformed<GameDraft>>> {
        let games: Vec<SdGame> = self
            .fetch_list(&format!("{}/scores/json/Games/{}", league.key(), season))
            .await?;
        Ok(games.into_iter().map(transform_game).collect())
    }

    async fn fetch_season_stats(&self, league: League, season: i32) -> Result<Vec<SeasonStatDraft>> {
        let stats: Vec<SdSeasonStat> = self
            .fetch_list(&format!(
                "{}/stats/json/PlayerSeasonStats/{}",
                league.key(),
                season
            ))
            .await?;
        Ok(stats
            .into_iter()
            .filter_map(|s| transform_season_stat(s, season))
            .collect())
    }

    async fn fetch_game_odds(&self, league: League, date: NaiveDate) -> Result<Vec<GameOddsDraft>> {
        let games: Vec<SdGameOdds> = self
            .fetch_list(&format!(
                "{}/odds/json/GameOddsByDate/{}",
                league.key(),
                date.format("%Y-%m-%d")
            ))
            .await?;
        Ok(games.into_iter().flat_map(transform_odds).collect())
    }
}
