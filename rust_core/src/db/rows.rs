//! [`UpsertRow`] bindings for the destination tables.

use crate::db::upsert::UpsertRow;
use crate::types::{GameOddsRow, GameRow, PlayerRow, SeasonStatRow, TeamRow};
use sqlx::query_builder::Separated;
use sqlx::Postgres;

impl UpsertRow for TeamRow {
    const TABLE: &'static str = "teams";
    const CONFLICT: &'static str = "external_id, league_id";
    const COLUMNS: &'static [&'static str] = &[
        "external_id",
        "league_id",
        "name",
        "city",
        "abbreviation",
        "primary_color",
        "secondary_color",
        "logo_url",
        "venue_name",
        "venue_city",
        "venue_state",
        "venue_capacity",
        "is_active",
        "source_system",
    ];
    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "name",
        "city",
        "abbreviation",
        "primary_color",
        "secondary_color",
        "logo_url",
        "venue_name",
        "venue_city",
        "venue_state",
        "venue_capacity",
        "is_active",
        "source_system",
    ];
    const RETURNS_EXTERNAL_ID: bool = true;

    fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.external_id.clone());
        b.push_bind(self.league_id);
        b.push_bind(self.name.clone());
        b.push_bind(self.city.clone());
        b.push_bind(self.abbreviation.clone());
        b.push_bind(self.primary_color.clone());
        b.push_bind(self.secondary_color.clone());
        b.push_bind(self.logo_url.clone());
        b.push_bind(self.venue_name.clone());
        b.push_bind(self.venue_city.clone());
        b.push_bind(self.venue_state.clone());
        b.push_bind(self.venue_capacity);
        b.push_bind(self.is_active);
        b.push_bind(self.source_system.clone());
    }

    fn key(&self) -> String {
        self.external_id.clone()
    }
}

impl UpsertRow for PlayerRow {
    const TABLE: &'static str = "players";
    const CONFLICT: &'static str = "external_id";
    const COLUMNS: &'static [&'static str] = &[
        "external_id",
        "first_name",
        "last_name",
        "full_name",
        "primary_position",
        "jersey_number",
        "height_inches",
        "weight_lbs",
        "birth_date",
        "birth_city",
        "birth_country",
        "bat_side",
        "throw_hand",
        "photo_url",
        "roster_status",
        "current_injury",
        "is_active",
        "team_id",
        "source_system",
    ];
    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "full_name",
        "primary_position",
        "jersey_number",
        "height_inches",
        "weight_lbs",
        "birth_date",
        "birth_city",
        "birth_country",
        "bat_side",
        "throw_hand",
        "photo_url",
        "roster_status",
        "current_injury",
        "is_active",
        "team_id",
        "source_system",
    ];
    const RETURNS_EXTERNAL_ID: bool = true;

    fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.external_id.clone());
        b.push_bind(self.first_name.clone());
        b.push_bind(self.last_name.clone());
        b.push_bind(self.full_name.clone());
        b.push_bind(self.primary_position.clone());
        b.push_bind(self.jersey_number);
        b.push_bind(self.height_inches);
        b.push_bind(self.weight_lbs);
        b.push_bind(self.birth_date);
        b.push_bind(self.birth_city.clone());
        b.push_bind(self.birth_country.clone());
        b.push_bind(self.bat_side.clone());
        b.push_bind(self.throw_hand.clone());
        b.push_bind(self.photo_url.clone());
        b.push_bind(self.roster_status.clone());
        b.push_bind(self.current_injury.clone());
        b.push_bind(self.is_active);
        b.push_bind(self.team_id);
        b.push_bind(self.source_system.clone());
    }

    fn key(&self) -> String {
        format!("{} ({})", self.full_name, self.external_id)
    }
}

impl UpsertRow for GameRow {
    const TABLE: &'static str = "games";
    const CONFLICT: &'static str = "external_id, league_id";
    const COLUMNS: &'static [&'static str] = &[
        "external_id",
        "league_id",
        "season",
        "season_type",
        "game_time_utc",
        "status",
        "home_team_id",
        "away_team_id",
        "home_score",
        "away_score",
        "home_moneyline",
        "away_moneyline",
        "spread",
        "over_under",
    ];
    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "season",
        "season_type",
        "game_time_utc",
        "status",
        "home_team_id",
        "away_team_id",
        "home_score",
        "away_score",
        "home_moneyline",
        "away_moneyline",
        "spread",
        "over_under",
    ];
    const RETURNS_EXTERNAL_ID: bool = true;

    fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.external_id.clone());
        b.push_bind(self.league_id);
        b.push_bind(self.season);
        b.push_bind(self.season_type.clone());
        b.push_bind(self.game_time_utc);
        b.push_bind(self.status.clone());
        b.push_bind(self.home_team_id);
        b.push_bind(self.away_team_id);
        b.push_bind(self.home_score);
        b.push_bind(self.away_score);
        b.push_bind(self.home_moneyline);
        b.push_bind(self.away_moneyline);
        b.push_bind(self.spread);
        b.push_bind(self.over_under);
    }

    fn key(&self) -> String {
        self.external_id.clone()
    }
}

impl UpsertRow for SeasonStatRow {
    const TABLE: &'static str = "player_season_stats";
    const CONFLICT: &'static str = "player_id, team_id, season, league_id";
    const COLUMNS: &'static [&'static str] = &[
        "player_id",
        "team_id",
        "league_id",
        "season",
        "games_played",
        "games_started",
        "minutes_played",
        "stats",
        "advanced_stats",
    ];
    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "games_played",
        "games_started",
        "minutes_played",
        "stats",
        "advanced_stats",
    ];

    fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.player_id);
        b.push_bind(self.team_id);
        b.push_bind(self.league_id);
        b.push_bind(self.season);
        b.push_bind(self.games_played);
        b.push_bind(self.games_started);
        b.push_bind(self.minutes_played);
        b.push_bind(self.stats.clone());
        b.push_bind(self.advanced_stats.clone());
    }

    fn key(&self) -> String {
        format!("{}:{}", self.player_id, self.season)
    }
}

impl UpsertRow for GameOddsRow {
    const TABLE: &'static str = "game_odds";
    const CONFLICT: &'static str = "game_id, sportsbook";
    const COLUMNS: &'static [&'static str] = &[
        "game_id",
        "sportsbook",
        "home_moneyline",
        "away_moneyline",
        "home_spread",
        "home_spread_odds",
        "away_spread",
        "away_spread_odds",
        "over_under",
        "over_odds",
        "under_odds",
        "last_updated",
    ];
    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "home_moneyline",
        "away_moneyline",
        "home_spread",
        "home_spread_odds",
        "away_spread",
        "away_spread_odds",
        "over_under",
        "over_odds",
        "under_odds",
        "last_updated",
    ];
    // Odds rows track freshness with their own last_updated column.
    const SET_UPDATED_AT: bool = false;

    fn bind(&self, b: &mut Separated<'_, '_, Postgres, &'static str>) {
        b.push_bind(self.game_id);
        b.push_bind(self.sportsbook.clone());
        b.push_bind(self.home_moneyline);
        b.push_bind(self.away_moneyline);
        b.push_bind(self.home_spread);
        b.push_bind(self.home_spread_odds);
        b.push_bind(self.away_spread);
        b.push_bind(self.away_spread_odds);
        b.push_bind(self.over_under);
        b.push_bind(self.over_odds);
        b.push_bind(self.under_odds);
        b.push_bind(self.last_updated);
    }

    fn key(&self) -> String {
        format!("{}:{}", self.game_id, self.sportsbook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_and_binds_stay_in_step() {
        // Conflict keys must be insert columns but never update columns.
        for conflict_col in TeamRow::CONFLICT.split(", ") {
            assert!(TeamRow::COLUMNS.contains(&conflict_col));
            assert!(!TeamRow::UPDATE_COLUMNS.contains(&conflict_col));
        }
        for conflict_col in GameRow::CONFLICT.split(", ") {
            assert!(GameRow::COLUMNS.contains(&conflict_col));
            assert!(!GameRow::UPDATE_COLUMNS.contains(&conflict_col));
        }
        for conflict_col in SeasonStatRow::CONFLICT.split(", ") {
            assert!(SeasonStatRow::COLUMNS.contains(&conflict_col));
            assert!(!SeasonStatRow::UPDATE_COLUMNS.contains(&conflict_col));
        }
        assert!(!PlayerRow::UPDATE_COLUMNS.contains(&"external_id"));
        assert!(!GameOddsRow::UPDATE_COLUMNS.contains(&"game_id"));
        assert!(!GameOddsRow::UPDATE_COLUMNS.contains(&"sportsbook"));
    }
}
