//! Destination-side seam for the sync pipeline.
//!
//! [`SyncStore`] is the trait the pipeline drives; [`PgStore`] is the sqlx
//! implementation. Keeping the seam a trait lets pipeline tests run against
//! an in-memory store.

use crate::db::retry::execute_with_retry;
use crate::db::upsert::{upsert_rows, UpsertReport};
use crate::types::{GameOddsRow, GameRow, League, PlayerRow, SeasonStatRow, TeamRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const DB_RETRY_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Internal id for a league, creating the row from the seeded registry
    /// when it does not exist yet.
    async fn league_id(&self, league: League) -> Result<Uuid>;

    async fn load_team_ids(&self, league_id: Uuid) -> Result<Vec<(String, Uuid)>>;
    /// `(name, id)` pairs for building a fuzzy name index.
    async fn load_team_names(&self, league_id: Uuid) -> Result<Vec<(String, Uuid)>>;
    async fn load_player_ids(&self) -> Result<Vec<(String, Uuid)>>;
    async fn load_game_ids(&self, league_id: Uuid) -> Result<Vec<(String, Uuid)>>;

    async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<UpsertReport>;
    async fn upsert_players(&self, rows: &[PlayerRow]) -> Result<UpsertReport>;
    async fn upsert_games(&self, rows: &[GameRow]) -> Result<UpsertReport>;
    async fn upsert_season_stats(&self, rows: &[SeasonStatRow]) -> Result<UpsertReport>;
    async fn upsert_game_odds(&self, rows: &[GameOddsRow]) -> Result<UpsertReport>;
}

pub struct PgStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgStore {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    async fn load_pairs(&self, sql: &str, league_id: Option<Uuid>) -> Result<Vec<(String, Uuid)>> {
        execute_with_retry(
            || async {
                let query = sqlx::query_as::<_, (String, Uuid)>(sql);
                let query = match league_id {
                    Some(id) => query.bind(id),
                    None => query,
                };
                query
                    .fetch_all(&self.pool)
                    .await
                    .with_context(|| format!("bulk id load failed: {}", sql))
            },
            DB_RETRY_ATTEMPTS,
        )
        .await
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn league_id(&self, league: League) -> Result<Uuid> {
        execute_with_retry(
            || async {
                sqlx::query_scalar::<_, Uuid>(
                    "INSERT INTO leagues (key, name, external_id) VALUES ($1, $2, $3) \
                     ON CONFLICT (key) DO UPDATE SET name = EXCLUDED.name \
                     RETURNING id",
                )
                .bind(league.key())
                .bind(league.display_name())
                .bind(league.seed_external_id())
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("get-or-create league {} failed", league))
            },
            DB_RETRY_ATTEMPTS,
        )
        .await
    }

    async fn load_team_ids(&self, league_id: Uuid) -> Result<Vec<(String, Uuid)>> {
        self.load_pairs(
            "SELECT external_id, id FROM teams WHERE league_id = $1",
            Some(league_id),
        )
        .await
    }

    async fn load_team_names(&self, league_id: Uuid) -> Result<Vec<(String, Uuid)>> {
        self.load_pairs(
            "SELECT name, id FROM teams WHERE league_id = $1",
            Some(league_id),
        )
        .await
    }

    async fn load_player_ids(&self) -> Result<Vec<(String, Uuid)>> {
        self.load_pairs("SELECT external_id, id FROM players", None).await
    }

    async fn load_game_ids(&self, league_id: Uuid) -> Result<Vec<(String, Uuid)>> {
        self.load_pairs(
            "SELECT external_id, id FROM games WHERE league_id = $1",
            Some(league_id),
        )
        .await
    }

    async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<UpsertReport> {
        Ok(upsert_rows(&self.pool, rows, self.batch_size).await)
    }

    async fn upsert_players(&self, rows: &[PlayerRow]) -> Result<UpsertReport> {
        Ok(upsert_rows(&self.pool, rows, self.batch_size).await)
    }

    async fn upsert_games(&self, rows: &[GameRow]) -> Result<UpsertReport> {
        Ok(upsert_rows(&self.pool, rows, self.batch_size).await)
    }

    async fn upsert_season_stats(&self, rows: &[SeasonStatRow]) -> Result<UpsertReport> {
        Ok(upsert_rows(&self.pool, rows, self.batch_size).await)
    }

    async fn upsert_game_odds(&self, rows: &[GameOddsRow]) -> Result<UpsertReport> {
        Ok(upsert_rows(&self.pool, rows, self.batch_size).await)
    }
}
