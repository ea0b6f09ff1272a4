//! Best-effort sync driver.
//!
//! One run covers one league with one provider, in dependency order:
//! teams, players, season stats, games, odds. Each stage resolves its
//! foreign keys through the run-scoped ID caches, logs its own failures and
//! never aborts the run; the only hard error is failing to resolve the
//! league row itself, since nothing downstream can be keyed without it.

use crate::cache::IdCache;
use crate::clients::SportsProvider;
use crate::db::store::SyncStore;
use crate::matching::NameIndex;
use crate::types::{
    GameOddsRow, GameRow, League, PlayerDraft, SeasonStatRow, Transformed,
};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub season: i32,
    pub sync_games: bool,
    pub sync_stats: bool,
    pub sync_odds: bool,
    /// Dates to pull pregame odds for, when odds are enabled.
    pub odds_dates: Vec<NaiveDate>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            season: Utc::now().year(),
            sync_games: true,
            sync_stats: true,
            sync_odds: false,
            odds_dates: Vec::new(),
        }
    }
}

/// Per-stage outcome counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageCounts {
    pub fetched: usize,
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Whole-stage failures (fetch or store errors), as opposed to
    /// per-record ones.
    pub stage_errors: usize,
}

impl StageCounts {
    fn note_error(&mut self) {
        self.stage_errors += 1;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub teams: StageCounts,
    pub players: StageCounts,
    pub season_stats: StageCounts,
    pub games: StageCounts,
    pub game_odds: StageCounts,
}

impl SyncReport {
    pub fn total_errors(&self) -> usize {
        [self.teams, self.players, self.season_stats, self.games, self.game_odds]
            .iter()
            .map(|s| s.failed + s.stage_errors)
            .sum()
    }

    pub fn log_summary(&self, league: League, provider: &str) {
        for (stage, counts) in [
            ("teams", self.teams),
            ("players", self.players),
            ("season_stats", self.season_stats),
            ("games", self.games),
            ("game_odds", self.game_odds),
        ] {
            info!(
                "{} [{}] {}: fetched={} written={} skipped={} failed={} stage_errors={}",
                league,
                provider,
                stage,
                counts.fetched,
                counts.written,
                counts.skipped,
                counts.failed,
                counts.stage_errors
            );
        }
    }
}

pub struct SyncPipeline<'a> {
    provider: &'a dyn SportsProvider,
    store: &'a dyn SyncStore,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(provider: &'a dyn SportsProvider, store: &'a dyn SyncStore) -> Self {
        Self { provider, store }
    }

    pub async fn run(&self, league: League, opts: &SyncOptions) -> Result<SyncReport> {
        let league_id = self
            .store
            .league_id(league)
            .await
            .with_context(|| format!("cannot resolve league row for {}", league))?;
        info!("syncing {} from {} (league_id {})", league, self.provider.name(), league_id);

        let mut report = SyncReport::default();
        let mut team_cache = IdCache::new();
        let mut player_cache = IdCache::new();
        let mut game_cache = IdCache::new();

        self.sync_teams(league, league_id, &mut report.teams, &mut team_cache)
            .await;
        self.sync_players(league, league_id, &mut report.players, &mut team_cache, &mut player_cache)
            .await;
        if opts.sync_stats {
            self.sync_season_stats(league, league_id, opts.season, &mut report.season_stats, &mut team_cache, &mut player_cache)
                .await;
        }
        if opts.sync_games {
            self.sync_games(league, league_id, opts.season, &mut report.games, &mut team_cache, &mut game_cache)
                .await;
        }
        if opts.sync_odds {
            self.sync_game_odds(league, league_id, &opts.odds_dates, &mut report.game_odds, &mut game_cache)
                .await;
        }

        report.log_summary(league, self.provider.name());
        Ok(report)
    }

    async fn populate_team_cache(&self, league_id: Uuid, cache: &mut IdCache) {
        if let Err(e) = cache
            .ensure_populated(|| self.store.load_team_ids(league_id))
            .await
        {
            warn!("team id bulk load failed, resolutions may miss: {}", e);
        }
    }

    async fn sync_teams(
        &self,
        league: League,
        league_id: Uuid,
        counts: &mut StageCounts,
        team_cache: &mut IdCache,
    ) {
        let transformed = match self.provider.fetch_teams(league).await {
            Ok(t) => t,
            Err(e) => {
                error!("team fetch for {} failed, stage skipped: {:#}", league, e);
                counts.note_error();
                return;
            }
        };
        counts.fetched = transformed.len();

        let mut rows = Vec::new();
        for item in transformed {
            match item {
                Transformed::Row(mut row) => {
                    row.league_id = Some(league_id);
                    rows.push(row);
                }
                Transformed::Skip(reason) => {
                    debug!("skipping team record: {}", reason);
                    counts.skipped += 1;
                }
            }
        }
        if rows.is_empty() {
            return;
        }

        self.populate_team_cache(league_id, team_cache).await;
        match self.store.upsert_teams(&rows).await {
            Ok(outcome) => {
                counts.written += outcome.written;
                counts.failed += outcome.failed;
                team_cache.extend(&outcome.ids);
            }
            Err(e) => {
                error!("team upsert for {} failed: {:#}", league, e);
                counts.note_error();
            }
        }
    }

    async fn sync_players(
        &self,
        league: League,
        league_id: Uuid,
        counts: &mut StageCounts,
        team_cache: &mut IdCache,
        player_cache: &mut IdCache,
    ) {
        let transformed = match self.provider.fetch_players(league).await {
            Ok(p) => p,
            Err(e) => {
                error!("player fetch for {} failed, stage skipped: {:#}", league, e);
                counts.note_error();
                return;
            }
        };
        counts.fetched = transformed.len();
        if transformed.is_empty() {
            return;
        }

        self.populate_team_cache(league_id, team_cache).await;
        // Name index for vendors that reference teams by display name only.
        let name_index = match self.store.load_team_names(league_id).await {
            Ok(pairs) => NameIndex::from_pairs(pairs.iter().map(|(n, id)| (n.as_str(), *id))),
            Err(e) => {
                warn!("team name load failed, falling back to id-only resolution: {}", e);
                NameIndex::new()
            }
        };

        let mut rows = Vec::new();
        for item in transformed {
            match item {
                Transformed::Row(draft) => rows.push(resolve_player(draft, team_cache, &name_index)),
                Transformed::Skip(reason) => {
                    debug!("skipping player record: {}", reason);
                    counts.skipped += 1;
                }
            }
        }

        match self.store.upsert_players(&rows).await {
            Ok(outcome) => {
                counts.written += outcome.written;
                counts.failed += outcome.failed;
                player_cache.extend(&outcome.ids);
            }
            Err(e) => {
                error!("player upsert for {} failed: {:#}", league, e);
                counts.note_error();
            }
        }
    }

    async fn sync_season_stats(
        &self,
        league: League,
        league_id: Uuid,
        season: i32,
        counts: &mut StageCounts,
        team_cache: &mut IdCache,
        player_cache: &mut IdCache,
    ) {
        let drafts = match self.provider.fetch_season_stats(league, season).await {
            Ok(d) => d,
            Err(e) => {
                error!("season stat fetch for {} failed, stage skipped: {:#}", league, e);
                counts.note_error();
                return;
            }
        };
        counts.fetched = drafts.len();
        if drafts.is_empty() {
            return;
        }

        self.populate_team_cache(league_id, team_cache).await;
        if let Err(e) = player_cache
            .ensure_populated(|| self.store.load_player_ids())
            .await
        {
            warn!("player id bulk load failed: {}", e);
        }

        let mut rows = Vec::new();
        for draft in drafts {
            let Some(player_id) = player_cache.resolve(&draft.player_external_id) else {
                debug!("stat line for unknown player {}", draft.player_external_id);
                counts.skipped += 1;
                continue;
            };
            let Some(team_id) = team_cache.resolve(&draft.team_external_id) else {
                debug!("stat line for unknown team {}", draft.team_external_id);
                counts.skipped += 1;
                continue;
            };
            rows.push(SeasonStatRow {
                player_id,
                team_id,
                league_id,
                season: draft.season,
                games_played: draft.games_played,
                games_started: draft.games_started,
                minutes_played: draft.minutes_played,
                stats: draft.stats,
                advanced_stats: draft.advanced_stats,
            });
        }

        match self.store.upsert_season_stats(&rows).await {
            Ok(outcome) => {
                counts.written += outcome.written;
                counts.failed += outcome.failed;
            }
            Err(e) => {
                error!("season stat upsert for {} failed: {:#}", league, e);
                counts.note_error();
            }
        }
    }

    async fn sync_games(
        &self,
        league: League,
        league_id: Uuid,
        season: i32,
        counts: &mut StageCounts,
        team_cache: &mut IdCache,
        game_cache: &mut IdCache,
    ) {
        let transformed = match self.provider.fetch_games(league, season).await {
            Ok(g) => g,
            Err(e) => {
                error!("game fetch for {} failed, stage skipped: {:#}", league, e);
                counts.note_error();
                return;
            }
        };
        counts.fetched = transformed.len();
        if transformed.is_empty() {
            return;
        }

        self.populate_team_cache(league_id, team_cache).await;
        let mut rows = Vec::new();
        for item in transformed {
            let draft = match item {
                Transformed::Row(d) => d,
                Transformed::Skip(reason) => {
                    debug!("skipping game record: {}", reason);
                    counts.skipped += 1;
                    continue;
                }
            };
            let (Some(home), Some(away)) = (
                team_cache.resolve(&draft.home_team_external_id),
                team_cache.resolve(&draft.away_team_external_id),
            ) else {
                debug!("game {} references unknown team", draft.external_id);
                counts.skipped += 1;
                continue;
            };
            rows.push(GameRow {
                external_id: draft.external_id,
                league_id,
                season: draft.season,
                season_type: draft.season_type,
                game_time_utc: draft.game_time_utc,
                status: draft.status,
                home_team_id: home,
                away_team_id: away,
                home_score: draft.home_score,
                away_score: draft.away_score,
                home_moneyline: draft.home_moneyline,
                away_moneyline: draft.away_moneyline,
                spread: draft.spread,
                over_under: draft.over_under,
            });
        }

        match self.store.upsert_games(&rows).await {
            Ok(outcome) => {
                counts.written += outcome.written;
                counts.failed += outcome.failed;
                game_cache.extend(&outcome.ids);
            }
            Err(e) => {
                error!("game upsert for {} failed: {:#}", league, e);
                counts.note_error();
            }
        }
    }

    async fn sync_game_odds(
        &self,
        league: League,
        league_id: Uuid,
        dates: &[NaiveDate],
        counts: &mut StageCounts,
        game_cache: &mut IdCache,
    ) {
        if let Err(e) = game_cache
            .ensure_populated(|| self.store.load_game_ids(league_id))
            .await
        {
            warn!("game id bulk load failed: {}", e);
        }

        for date in dates {
            let drafts = match self.provider.fetch_game_odds(league, *date).await {
                Ok(d) => d,
                Err(e) => {
                    error!("odds fetch for {} on {} failed: {:#}", league, date, e);
                    counts.note_error();
                    continue;
                }
            };
            counts.fetched += drafts.len();

            let now = Utc::now();
            let mut rows = Vec::new();
            for draft in drafts {
                let Some(game_id) = game_cache.resolve(&draft.game_external_id) else {
                    debug!("odds for unknown game {}", draft.game_external_id);
                    counts.skipped += 1;
                    continue;
                };
                rows.push(GameOddsRow {
                    game_id,
                    sportsbook: draft.sportsbook,
                    home_moneyline: draft.home_moneyline,
                    away_moneyline: draft.away_moneyline,
                    home_spread: draft.home_spread,
                    home_spread_odds: draft.home_spread_odds,
                    away_spread: draft.away_spread,
                    away_spread_odds: draft.away_spread_odds,
                    over_under: draft.over_under,
                    over_odds: draft.over_odds,
                    under_odds: draft.under_odds,
                    last_updated: now,
                });
            }
            if rows.is_empty() {
                continue;
            }
            match self.store.upsert_game_odds(&rows).await {
                Ok(outcome) => {
                    counts.written += outcome.written;
                    counts.failed += outcome.failed;
                }
                Err(e) => {
                    error!("odds upsert for {} failed: {:#}", league, e);
                    counts.note_error();
                }
            }
        }
    }
}

/// Resolve a player draft's team reference: external id first, then the
/// fuzzy name index. Unresolvable references are legal and leave the player
/// unattached rather than dropping the record.
fn resolve_player(
    draft: PlayerDraft,
    team_cache: &IdCache,
    name_index: &NameIndex,
) -> crate::types::PlayerRow {
    let mut row = draft.row;
    row.team_id = draft
        .team_external_id
        .as_deref()
        .and_then(|ext| team_cache.resolve(ext))
        .or_else(|| draft.team_name.as_deref().and_then(|n| name_index.resolve(n)));
    if row.team_id.is_none() {
        debug!(
            "player {} has no resolvable team (ref {:?} / {:?})",
            row.external_id, draft.team_external_id, draft.team_name
        );
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::upsert::UpsertReport;
    use crate::types::{PlayerRow, SeasonStatDraft, TeamRow};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn team(external_id: &str, name: &str) -> Transformed<TeamRow> {
        Transformed::Row(TeamRow {
            external_id: external_id.to_string(),
            league_id: None,
            name: name.to_string(),
            city: None,
            abbreviation: None,
            primary_color: None,
            secondary_color: None,
            logo_url: None,
            venue_name: None,
            venue_city: None,
            venue_state: None,
            venue_capacity: None,
            is_active: true,
            source_system: "test".to_string(),
        })
    }

    fn player(external_id: &str, name: &str, team_ref: Option<&str>) -> Transformed<PlayerDraft> {
        Transformed::Row(PlayerDraft {
            row: PlayerRow {
                external_id: external_id.to_string(),
                first_name: name.to_string(),
                last_name: String::new(),
                full_name: name.to_string(),
                primary_position: None,
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
                source_system: "test".to_string(),
            },
            team_external_id: team_ref.map(str::to_string),
            team_name: None,
        })
    }

    struct MockProvider {
        teams: Vec<Transformed<TeamRow>>,
        players: Vec<Transformed<PlayerDraft>>,
    }

    #[async_trait]
    impl SportsProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }
        // Served through the paginator in fixed-size pages, the way a real
        // client drains a vendor list endpoint.
        async fn fetch_teams(&self, _league: League) -> Result<Vec<Transformed<TeamRow>>> {
            let opts = crate::paginate::PageOptions {
                batch_size: 2,
                page_delay: std::time::Duration::ZERO,
                ..Default::default()
            };
            crate::paginate::paginate(
                |limit, offset| {
                    let page: Vec<_> =
                        self.teams.iter().skip(offset).take(limit).cloned().collect();
                    async move { Ok(page) }
                },
                &opts,
            )
            .await
        }
        async fn fetch_players(&self, _league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
            Ok(self.players.clone())
        }
    }

    #[derive(Default)]
    struct MemoryState {
        league: Option<Uuid>,
        teams: HashMap<String, (Uuid, String)>,
        players: HashMap<String, (Uuid, Option<Uuid>)>,
        stats: usize,
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<MemoryState>,
    }

    #[async_trait]
    impl SyncStore for MemoryStore {
        async fn league_id(&self, _league: League) -> Result<Uuid> {
            let mut state = self.state.lock().unwrap();
            Ok(*state.league.get_or_insert_with(Uuid::new_v4))
        }

        async fn load_team_ids(&self, _league_id: Uuid) -> Result<Vec<(String, Uuid)>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .teams
                .iter()
                .map(|(ext, (id, _))| (ext.clone(), *id))
                .collect())
        }

        async fn load_team_names(&self, _league_id: Uuid) -> Result<Vec<(String, Uuid)>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .teams
                .values()
                .map(|(id, name)| (name.clone(), *id))
                .collect())
        }

        async fn load_player_ids(&self) -> Result<Vec<(String, Uuid)>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .players
                .iter()
                .map(|(ext, (id, _))| (ext.clone(), *id))
                .collect())
        }

        async fn load_game_ids(&self, _league_id: Uuid) -> Result<Vec<(String, Uuid)>> {
            Ok(Vec::new())
        }

        async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<UpsertReport> {
            let mut state = self.state.lock().unwrap();
            let mut report = UpsertReport::default();
            for row in rows {
                let id = state
                    .teams
                    .entry(row.external_id.clone())
                    .or_insert_with(|| (Uuid::new_v4(), row.name.clone()))
                    .0;
                report.written += 1;
                report.ids.push((row.external_id.clone(), id));
            }
            Ok(report)
        }

        async fn upsert_players(&self, rows: &[PlayerRow]) -> Result<UpsertReport> {
            let mut state = self.state.lock().unwrap();
            let mut report = UpsertReport::default();
            for row in rows {
                let entry = state
                    .players
                    .entry(row.external_id.clone())
                    .or_insert_with(|| (Uuid::new_v4(), None));
                entry.1 = row.team_id;
                report.written += 1;
                report.ids.push((row.external_id.clone(), entry.0));
            }
            Ok(report)
        }

        async fn upsert_games(&self, _rows: &[GameRow]) -> Result<UpsertReport> {
            Ok(UpsertReport::default())
        }

        async fn upsert_season_stats(&self, rows: &[SeasonStatRow]) -> Result<UpsertReport> {
            let mut state = self.state.lock().unwrap();
            state.stats += rows.len();
            Ok(UpsertReport {
                written: rows.len(),
                ..Default::default()
            })
        }

        async fn upsert_game_odds(&self, _rows: &[GameOddsRow]) -> Result<UpsertReport> {
            Ok(UpsertReport::default())
        }
    }

    fn options() -> SyncOptions {
        SyncOptions {
            season: 2025,
            sync_games: false,
            sync_stats: false,
            sync_odds: false,
            odds_dates: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_teams_then_players_resolve_in_same_run() {
        // Two pages worth of teams from the vendor, flattened by the client.
        let provider = MockProvider {
            teams: vec![
                team("t1", "Alpha City Aces"),
                team("t2", "Beta Bay Bolts"),
                team("t3", "Gamma Grove Giants"),
                team("t4", "Delta Dunes Drakes"),
            ],
            players: vec![
                player("p1", "One", Some("t1")),
                player("p2", "Two", Some("t4")),
            ],
        };
        let store = MemoryStore::default();
        let pipeline = SyncPipeline::new(&provider, &store);

        let report = pipeline.run(League::NBA, &options()).await.unwrap();
        assert_eq!(report.teams.written, 4);
        assert_eq!(report.players.written, 2);
        assert_eq!(report.total_errors(), 0);

        // Teams upserted this run resolved without a second bulk load; the
        // stored players point at real distinct team ids.
        let state = store.state.lock().unwrap();
        assert_eq!(state.teams.len(), 4);
        let t1 = state.teams["t1"].0;
        let t4 = state.teams["t4"].0;
        assert_ne!(t1, t4);
        assert_eq!(state.players["p1"].1, Some(t1));
        assert_eq!(state.players["p2"].1, Some(t4));
    }

    #[tokio::test]
    async fn test_unknown_team_reference_leaves_player_unattached() {
        let provider = MockProvider {
            teams: vec![team("t1", "Alpha City Aces")],
            players: vec![
                player("p1", "Known", Some("t1")),
                player("p2", "Orphan", Some("no-such-team")),
            ],
        };
        let store = MemoryStore::default();
        let pipeline = SyncPipeline::new(&provider, &store);

        let report = pipeline.run(League::NBA, &options()).await.unwrap();
        assert_eq!(report.players.written, 2);

        let state = store.state.lock().unwrap();
        assert!(state.players["p1"].1.is_some());
        assert_eq!(state.players["p2"].1, None);
    }

    #[tokio::test]
    async fn test_skips_counted_not_fatal() {
        let provider = MockProvider {
            teams: vec![team("t1", "Alpha City Aces"), Transformed::Skip("missing id")],
            players: vec![Transformed::Skip("missing id")],
        };
        let store = MemoryStore::default();
        let pipeline = SyncPipeline::new(&provider, &store);

        let report = pipeline.run(League::MLB, &options()).await.unwrap();
        assert_eq!(report.teams.fetched, 2);
        assert_eq!(report.teams.written, 1);
        assert_eq!(report.teams.skipped, 1);
        assert_eq!(report.players.skipped, 1);
        assert_eq!(report.total_errors(), 0);
    }

    struct FailingProvider;

    #[async_trait]
    impl SportsProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn fetch_teams(&self, _league: League) -> Result<Vec<Transformed<TeamRow>>> {
            anyhow::bail!("upstream down")
        }
        async fn fetch_players(&self, _league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
            Ok(vec![player("p1", "Solo", None)])
        }
    }

    #[tokio::test]
    async fn test_stage_failure_does_not_block_later_stages() {
        let store = MemoryStore::default();
        let provider = FailingProvider;
        let pipeline = SyncPipeline::new(&provider, &store);

        let report = pipeline.run(League::NHL, &options()).await.unwrap();
        assert_eq!(report.teams.stage_errors, 1);
        // Player stage still ran and stored the unattached player.
        assert_eq!(report.players.written, 1);
        let state = store.state.lock().unwrap();
        assert_eq!(state.players["p1"].1, None);
    }

    struct StatsProvider;

    #[async_trait]
    impl SportsProvider for StatsProvider {
        fn name(&self) -> &'static str {
            "stats"
        }
        async fn fetch_teams(&self, _league: League) -> Result<Vec<Transformed<TeamRow>>> {
            Ok(vec![team("t1", "Alpha City Aces")])
        }
        async fn fetch_players(&self, _league: League) -> Result<Vec<Transformed<PlayerDraft>>> {
            Ok(vec![player("p1", "One", Some("t1"))])
        }
        async fn fetch_season_stats(
            &self,
            _league: League,
            season: i32,
        ) -> Result<Vec<SeasonStatDraft>> {
            Ok(vec![
                SeasonStatDraft {
                    player_external_id: "p1".to_string(),
                    team_external_id: "t1".to_string(),
                    season,
                    games_played: Some(70),
                    games_started: None,
                    minutes_played: None,
                    stats: serde_json::json!({ "points": 1800 }),
                    advanced_stats: serde_json::json!({}),
                },
                SeasonStatDraft {
                    player_external_id: "ghost".to_string(),
                    team_external_id: "t1".to_string(),
                    season,
                    games_played: None,
                    games_started: None,
                    minutes_played: None,
                    stats: serde_json::json!({}),
                    advanced_stats: serde_json::json!({}),
                },
            ])
        }
    }

    #[tokio::test]
    async fn test_stats_resolve_and_skip_unknown_player() {
        let store = MemoryStore::default();
        let provider = StatsProvider;
        let pipeline = SyncPipeline::new(&provider, &store);

        let mut opts = options();
        opts.sync_stats = true;
        let report = pipeline.run(League::NBA, &opts).await.unwrap();
        assert_eq!(report.season_stats.fetched, 2);
        assert_eq!(report.season_stats.written, 1);
        assert_eq!(report.season_stats.skipped, 1);
        assert_eq!(store.state.lock().unwrap().stats, 1);
    }
}
