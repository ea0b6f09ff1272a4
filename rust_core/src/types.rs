//! Core types shared across the sync pipeline.
//!
//! Vendor JSON is parsed into per-vendor structs inside each client module;
//! everything downstream of the transform step works with the flat row types
//! defined here, whose fields mirror the destination table columns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Leagues the sync service knows how to pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    MLB,
    NBA,
    NFL,
    NHL,
    MLS,
}

impl League {
    /// Lowercase key used in vendor URLs and the `leagues.key` column.
    pub fn key(&self) -> &'static str {
        match self {
            League::MLB => "mlb",
            League::NBA => "nba",
            League::NFL => "nfl",
            League::NHL => "nhl",
            League::MLS => "mls",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            League::MLB => "Major League Baseball",
            League::NBA => "National Basketball Association",
            League::NFL => "National Football League",
            League::NHL => "National Hockey League",
            League::MLS => "Major League Soccer",
        }
    }

    /// Stable external id used when seeding the `leagues` table.
    pub fn seed_external_id(&self) -> i32 {
        match self {
            League::MLB => 1,
            League::NBA => 2,
            League::NFL => 3,
            League::NHL => 4,
            League::MLS => 5,
        }
    }

    /// (sport, league) path segments for the ESPN site API.
    pub fn espn_path(&self) -> (&'static str, &'static str) {
        match self {
            League::MLB => ("baseball", "mlb"),
            League::NBA => ("basketball", "nba"),
            League::NFL => ("football", "nfl"),
            League::NHL => ("hockey", "nhl"),
            League::MLS => ("soccer", "usa.1"),
        }
    }

    pub fn from_key(key: &str) -> Option<League> {
        match key.trim().to_lowercase().as_str() {
            "mlb" => Some(League::MLB),
            "nba" => Some(League::NBA),
            "nfl" => Some(League::NFL),
            "nhl" => Some(League::NHL),
            "mls" => Some(League::MLS),
            _ => None,
        }
    }

    pub fn all() -> [League; 5] {
        [League::MLB, League::NBA, League::NFL, League::NHL, League::MLS]
    }
}

impl std::fmt::Display for League {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of transforming a single vendor record.
///
/// Transforms never raise for bad data: a record missing its identity field
/// comes back as `Skip` with a reason, and the pipeline logs it and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed<T> {
    Row(T),
    Skip(&'static str),
}

impl<T> Transformed<T> {
    pub fn row(self) -> Option<T> {
        match self {
            Transformed::Row(r) => Some(r),
            Transformed::Skip(_) => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Transformed::Skip(_))
    }
}

/// Destination-shaped team record.
#[derive(Debug, Clone, Serialize)]
pub struct TeamRow {
    pub external_id: String,
    /// Filled in by the pipeline once the league is resolved.
    pub league_id: Option<Uuid>,
    pub name: String,
    pub city: Option<String>,
    pub abbreviation: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
    pub venue_name: Option<String>,
    pub venue_city: Option<String>,
    pub venue_state: Option<String>,
    pub venue_capacity: Option<i32>,
    pub is_active: bool,
    pub source_system: String,
}

/// Destination-shaped player record.
///
/// `team_id` is the internal team UUID, resolved by the pipeline through the
/// team ID cache; it stays `None` when the vendor reference cannot be
/// resolved (unattached players are legal).
#[derive(Debug, Clone, Serialize)]
pub struct PlayerRow {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub primary_position: Option<String>,
    pub jersey_number: Option<i32>,
    pub height_inches: Option<i32>,
    pub weight_lbs: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub birth_city: Option<String>,
    pub birth_country: Option<String>,
    pub bat_side: Option<String>,
    pub throw_hand: Option<String>,
    pub photo_url: Option<String>,
    pub roster_status: Option<String>,
    pub current_injury: Option<serde_json::Value>,
    pub is_active: Option<bool>,
    pub team_id: Option<Uuid>,
    pub source_system: String,
}

/// Player record as produced by a vendor transform, before foreign-key
/// resolution. Carries the vendor-side team reference for the pipeline.
#[derive(Debug, Clone)]
pub struct PlayerDraft {
    pub row: PlayerRow,
    pub team_external_id: Option<String>,
    pub team_name: Option<String>,
}

/// Destination-shaped game record (after team resolution).
#[derive(Debug, Clone, Serialize)]
pub struct GameRow {
    pub external_id: String,
    pub league_id: Uuid,
    pub season: Option<i32>,
    pub season_type: Option<String>,
    pub game_time_utc: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    pub spread: Option<f64>,
    pub over_under: Option<f64>,
}

/// Game record before team resolution.
#[derive(Debug, Clone)]
pub struct GameDraft {
    pub external_id: String,
    pub season: Option<i32>,
    pub season_type: Option<String>,
    pub game_time_utc: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub home_team_external_id: String,
    pub away_team_external_id: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    pub spread: Option<f64>,
    pub over_under: Option<f64>,
}

/// Per-player per-season stat line (after resolution).
///
/// Sport-specific counters land in the sparse `stats` JSON document; the
/// small set of rate/advanced metrics is split into `advanced_stats` so the
/// frontend can query them separately.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonStatRow {
    pub player_id: Uuid,
    pub team_id: Uuid,
    pub league_id: Uuid,
    pub season: i32,
    pub games_played: Option<i32>,
    pub games_started: Option<i32>,
    pub minutes_played: Option<f64>,
    pub stats: serde_json::Value,
    pub advanced_stats: serde_json::Value,
}

/// Stat line before resolution.
#[derive(Debug, Clone)]
pub struct SeasonStatDraft {
    pub player_external_id: String,
    pub team_external_id: String,
    pub season: i32,
    pub games_played: Option<i32>,
    pub games_started: Option<i32>,
    pub minutes_played: Option<f64>,
    pub stats: serde_json::Value,
    pub advanced_stats: serde_json::Value,
}

/// Per-sportsbook pregame odds for one game (after resolution).
#[derive(Debug, Clone, Serialize)]
pub struct GameOddsRow {
    pub game_id: Uuid,
    pub sportsbook: String,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    pub home_spread: Option<f64>,
    pub home_spread_odds: Option<i32>,
    pub away_spread: Option<f64>,
    pub away_spread_odds: Option<i32>,
    pub over_under: Option<f64>,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

/// Odds record before game resolution.
#[derive(Debug, Clone)]
pub struct GameOddsDraft {
    pub game_external_id: String,
    pub sportsbook: String,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    pub home_spread: Option<f64>,
    pub home_spread_odds: Option<i32>,
    pub away_spread: Option<f64>,
    pub away_spread_odds: Option<i32>,
    pub over_under: Option<f64>,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
}

impl GameOddsDraft {
    /// A record with no market data at all is not worth storing.
    pub fn has_any_market(&self) -> bool {
        self.home_moneyline.is_some()
            || self.away_moneyline.is_some()
            || self.home_spread.is_some()
            || self.away_spread.is_some()
            || self.over_under.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_league_round_trip() {
        for league in League::all() {
            assert_eq!(League::from_key(league.key()), Some(league));
        }
        assert_eq!(League::from_key("NBA"), Some(League::NBA));
        assert_eq!(League::from_key("cricket"), None);
    }

    #[test]
    fn test_transformed_accessors() {
        let row: Transformed<i32> = Transformed::Row(7);
        assert_eq!(row.row(), Some(7));

        let skip: Transformed<i32> = Transformed::Skip("missing id");
        assert!(skip.is_skip());
        assert_eq!(skip.row(), None);
    }

    #[test]
    fn test_odds_draft_market_presence() {
        let mut draft = GameOddsDraft {
            game_external_id: "g1".to_string(),
            sportsbook: "TestBook".to_string(),
            home_moneyline: None,
            away_moneyline: None,
            home_spread: None,
            home_spread_odds: None,
            away_spread: None,
            away_spread_odds: None,
            over_under: None,
            over_odds: None,
            under_odds: None,
        };
        assert!(!draft.has_any_market());
        draft.over_under = Some(8.5);
        assert!(draft.has_any_market());
    }
}
