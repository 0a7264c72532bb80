//! Review session: the tracked player, their game store and the rating
//! cache, held together for the lifetime of one run.

use std::collections::HashSet;

use chrono::{Datelike, Utc};
use tracing::info;

use game_core::pgn;
use game_core::rating::{self, RatingCache, RatingPoint, RatingWindow};
use game_core::replay::ReplayState;
use game_core::GameRecord;

use crate::clients::chess_com::ChessComClient;
use crate::config::{default_database_path, Config};
use crate::db::GameStore;
use crate::error::ReviewError;

pub struct Session {
    username: String,
    store: GameStore,
    client: ChessComClient,
    rating_cache: RatingCache,
}

impl Session {
    /// Open a session for the configured player, creating their database
    /// if it does not exist yet.
    pub async fn open(config: &Config) -> Result<Self, ReviewError> {
        let store = GameStore::open(&config.database_path).await?;
        Ok(Self {
            username: config.username.clone(),
            store,
            client: ChessComClient::new(),
            rating_cache: RatingCache::default(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// Switch the session to a different player. Each player gets their
    /// own database file; the rating cache does not carry over.
    pub async fn switch_user(&mut self, username: &str) -> Result<(), ReviewError> {
        let path = default_database_path(username);
        self.store = GameStore::open(&path).await?;
        self.username = username.to_string();
        self.rating_cache.invalidate();
        info!(username, database = %path, "Switched tracked player");
        Ok(())
    }

    /// Fetch the current month's archive for the tracked player.
    pub async fn fetch_current_month(&mut self) -> Result<(usize, u64), ReviewError> {
        let now = Utc::now();
        self.fetch_month(now.year(), now.month()).await
    }

    /// Fetch one month's archive, parse it and store the games. Returns
    /// (games parsed, games newly inserted). A month with no games is a
    /// normal empty result.
    pub async fn fetch_month(&mut self, year: i32, month: u32) -> Result<(usize, u64), ReviewError> {
        let Some(raw) = self
            .client
            .fetch_month_pgn(&self.username, year, month)
            .await?
        else {
            info!(year, month, "No games in archive for this month");
            return Ok((0, 0));
        };

        let records = pgn::parse_games(&raw);
        let parsed = records.len();
        let inserted = self.store.upsert(&records).await?;
        info!(year, month, parsed, inserted, "Fetched monthly archive");

        if inserted > 0 {
            self.rating_cache.invalidate();
        }
        Ok((parsed, inserted))
    }

    /// Load a stored game and a replay cursor over its moves.
    pub async fn select_game(&self, url: &str) -> Result<(GameRecord, ReplayState), ReviewError> {
        let record = self
            .store
            .fetch_by_url(url)
            .await?
            .ok_or_else(|| ReviewError::GameNotFound(url.to_string()))?;
        let replay = ReplayState::from_pgn(&record.pgn)?;
        Ok((record, replay))
    }

    /// Rating history for `player`, windowed and filtered. The sorted
    /// full sequence is cached per player; `window` defaults to the whole
    /// sequence.
    pub async fn rating_history(
        &mut self,
        player: &str,
        window: Option<RatingWindow>,
        time_controls: Option<&HashSet<String>>,
    ) -> Result<Vec<RatingPoint>, ReviewError> {
        if !self.rating_cache.contains(player) {
            let games = self.store.fetch_all().await?;
            self.rating_cache.put(player, rating::history(player, &games));
        }
        let points = self.rating_cache.get(player).unwrap_or(&[]);

        let window = window.unwrap_or_else(|| RatingWindow::full(points.len()));
        Ok(rating::select(points, window, time_controls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(url: &str, end_time: i64, white_elo: &str) -> GameRecord {
        let pgn = format!(
            "[White \"alice\"]\n[Black \"bob\"]\n[WhiteElo \"{white_elo}\"]\n[BlackElo \"1400\"]\n[TimeControl \"600\"]\n[Link \"{url}\"]\n\n1. e4 e5 *"
        );
        GameRecord {
            url: url.to_string(),
            pgn,
            end_time,
            white: "alice".into(),
            black: "bob".into(),
            time_control: "600".into(),
            evaluation: None,
        }
    }

    async fn session_with(games: &[GameRecord]) -> Session {
        let store = GameStore::open_in_memory().await.unwrap();
        store.upsert(games).await.unwrap();
        Session {
            username: "alice".into(),
            store,
            client: ChessComClient::new(),
            rating_cache: RatingCache::default(),
        }
    }

    #[tokio::test]
    async fn test_select_game_builds_replay() {
        let session = session_with(&[game("https://x/1", 100, "1500")]).await;
        let (record, replay) = session.select_game("https://x/1").await.unwrap();
        assert_eq!(record.url, "https://x/1");
        assert_eq!(replay.len(), 2);
    }

    #[tokio::test]
    async fn test_select_game_unknown_url() {
        let session = session_with(&[]).await;
        let err = session.select_game("https://x/none").await.unwrap_err();
        assert!(matches!(err, ReviewError::GameNotFound(_)));
    }

    #[tokio::test]
    async fn test_rating_history_is_sorted_and_windowed() {
        let mut session = session_with(&[
            game("https://x/2", 200, "1520"),
            game("https://x/1", 100, "1500"),
            game("https://x/3", 300, "1540"),
        ])
        .await;

        let all = session.rating_history("alice", None, None).await.unwrap();
        let ratings: Vec<i32> = all.iter().map(|p| p.rating).collect();
        assert_eq!(ratings, vec![1500, 1520, 1540]);

        let windowed = session
            .rating_history("alice", Some(RatingWindow::new(2, 3)), None)
            .await
            .unwrap();
        let ratings: Vec<i32> = windowed.iter().map(|p| p.rating).collect();
        assert_eq!(ratings, vec![1520, 1540]);
    }

    #[tokio::test]
    async fn test_rating_history_unknown_player_is_empty() {
        let mut session = session_with(&[game("https://x/1", 100, "1500")]).await;
        let points = session.rating_history("carol", None, None).await.unwrap();
        assert!(points.is_empty());
    }
}
