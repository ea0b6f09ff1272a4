//! Vendor API clients.
//!
//! Each client owns a [`crate::http::RateLimitedClient`] configured with the
//! vendor's auth scheme and quota pacing, parses the vendor's JSON into its
//! own serde structs, and converts them to the flat draft/row types. The
//! pipeline only sees the [`SportsProvider`] trait.

pub mod apisports;
pub mod espn;
pub mod mysportsfeeds;
pub mod sportsdata;

use crate::types::{
    GameDraft, GameOddsDraft, League, PlayerDraft, SeasonStatDraft, TeamRow, Transformed,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Upstream data source seam.
///
/// Teams and players are the baseline every vendor supports; games, stats
/// and odds default to empty so partial vendors stay simple.
#[async_trait]
pub trait SportsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_teams(&self, league: League) -> Result<Vec<Transformed<TeamRow>>>;

    async fn fetch_players(&self, league: League) -> Result<Vec<Transformed<PlayerDraft>>>;

    async fn fetch_games(&self, _league: League, _season: i32) -> Result<Vec<Transformed<GameDraft>>> {
        Ok(Vec::new())
    }

    async fn fetch_season_stats(
        &self,
        _league: League,
        _season: i32,
    ) -> Result<Vec<SeasonStatDraft>> {
        Ok(Vec::new())
    }

    async fn fetch_game_odds(&self, _league: League, _date: NaiveDate) -> Result<Vec<GameOddsDraft>> {
        Ok(Vec::new())
    }
}
