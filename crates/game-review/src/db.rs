//! SQLite-backed game store.
//!
//! One store owns one database file exclusively; callers serialize
//! writes themselves. Schema migration is additive-only and idempotent:
//! columns are added when missing, never dropped or renamed.

use std::collections::HashSet;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use game_core::{EvaluationData, GameRecord};

use crate::error::ReviewError;

/// Columns added after the base schema shipped. Databases created by
/// older builds are migrated in place on open.
const MIGRATED_COLUMNS: &[(&str, &str)] = &[("time_control", "TEXT"), ("evaluation_data", "TEXT")];

/// Row type for game queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct GameRow {
    url: String,
    pgn: String,
    end_time: i64,
    white: String,
    black: String,
    time_control: Option<String>,
    evaluation_data: Option<String>,
}

impl GameRow {
    fn into_record(self) -> GameRecord {
        // A blob that fails to deserialize is treated as absent rather
        // than failing the whole read.
        let evaluation = self
            .evaluation_data
            .as_deref()
            .and_then(|blob| serde_json::from_str(blob).ok());

        GameRecord {
            url: self.url,
            pgn: self.pgn,
            end_time: self.end_time,
            white: self.white,
            black: self.black,
            time_control: self.time_control.unwrap_or_default(),
            evaluation,
        }
    }
}

const SELECT_GAME: &str =
    "SELECT url, pgn, end_time, white, black, time_control, evaluation_data FROM games";

pub struct GameStore {
    pool: SqlitePool,
}

impl GameStore {
    /// Open (or create) the database at `path` and bring the schema up
    /// to date.
    pub async fn open(path: &str) -> Result<Self, ReviewError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory database for tests. Schema is applied.
    pub async fn open_in_memory() -> Result<Self, ReviewError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(sqlx::Error::from)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the games table if missing and add any column the schema
    /// has grown since the database was created. Existing rows are never
    /// touched. A failure here is fatal for the open.
    async fn ensure_schema(&self) -> Result<(), ReviewError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                url TEXT PRIMARY KEY,
                pgn TEXT,
                end_time INTEGER,
                white TEXT,
                black TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query("PRAGMA table_info(games)")
            .fetch_all(&self.pool)
            .await?;
        let mut existing = HashSet::new();
        for row in &rows {
            existing.insert(row.try_get::<String, _>("name")?);
        }

        for (column, sql_type) in MIGRATED_COLUMNS {
            if !existing.contains(*column) {
                info!(column, "Adding missing column to games table");
                sqlx::query(&format!("ALTER TABLE games ADD COLUMN {column} {sql_type}"))
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    /// Insert-if-absent by `url`. Re-inserting an existing url is a
    /// silent no-op that preserves the stored row, including any
    /// computed evaluation. Returns the number of newly inserted rows.
    pub async fn upsert(&self, records: &[GameRecord]) -> Result<u64, ReviewError> {
        let mut inserted = 0u64;
        for record in records {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO games
                    (url, pgn, end_time, white, black, time_control)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.url)
            .bind(&record.pgn)
            .bind(record.end_time)
            .bind(&record.white)
            .bind(&record.black)
            .bind(&record.time_control)
            .execute(&self.pool)
            .await?;

            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// All stored games, most recently finished first.
    pub async fn fetch_all(&self) -> Result<Vec<GameRecord>, ReviewError> {
        let rows: Vec<GameRow> =
            sqlx::query_as(&format!("{SELECT_GAME} ORDER BY end_time DESC"))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(GameRow::into_record).collect())
    }

    pub async fn fetch_by_url(&self, url: &str) -> Result<Option<GameRecord>, ReviewError> {
        let row: Option<GameRow> = sqlx::query_as(&format!("{SELECT_GAME} WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(GameRow::into_record))
    }

    /// Store a completed evaluation for one game. The blob is written in
    /// a single UPDATE, so a reader never observes a partial write.
    pub async fn update_evaluation(
        &self,
        url: &str,
        data: &EvaluationData,
    ) -> Result<(), ReviewError> {
        let blob = serde_json::to_string(data)?;
        let result = sqlx::query("UPDATE games SET evaluation_data = ? WHERE url = ?")
            .bind(blob)
            .bind(url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReviewError::GameNotFound(url.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, end_time: i64) -> GameRecord {
        GameRecord {
            url: url.to_string(),
            pgn: format!("[Link \"{url}\"]\n\n1. e4 e5 *"),
            end_time,
            white: "alice".into(),
            black: "bob".into(),
            time_control: "600".into(),
            evaluation: None,
        }
    }

    fn eval_data() -> EvaluationData {
        EvaluationData {
            scores: vec![0.2, 0.1, 0.3],
            is_mate: vec![false, false, false],
            wdl_probs: vec![(0.4, 0.5, 0.1); 3],
            depth: 10,
        }
    }

    #[tokio::test]
    async fn test_schema_migration_is_idempotent() {
        let store = GameStore::open_in_memory().await.unwrap();
        // second run must find every column already present
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_is_insert_if_absent() {
        let store = GameStore::open_in_memory().await.unwrap();
        let games = vec![record("https://x/1", 100), record("https://x/2", 200)];

        assert_eq!(store.upsert(&games).await.unwrap(), 2);
        assert_eq!(store.upsert(&games).await.unwrap(), 0);
        assert_eq!(store.fetch_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refetch_preserves_evaluation() {
        let store = GameStore::open_in_memory().await.unwrap();
        let games = vec![record("https://x/1", 100)];
        store.upsert(&games).await.unwrap();

        let data = eval_data();
        store.update_evaluation("https://x/1", &data).await.unwrap();

        // refetch with a different move list but the same url
        let mut refetched = record("https://x/1", 100);
        refetched.pgn = "[Link \"https://x/1\"]\n\n1. d4 d5 *".into();
        assert_eq!(store.upsert(&[refetched]).await.unwrap(), 0);

        let stored = store.fetch_by_url("https://x/1").await.unwrap().unwrap();
        assert!(stored.pgn.contains("1. e4 e5"));
        assert_eq!(stored.evaluation, Some(data));
    }

    #[tokio::test]
    async fn test_fetch_all_newest_first() {
        let store = GameStore::open_in_memory().await.unwrap();
        store
            .upsert(&[record("https://x/old", 100), record("https://x/new", 300)])
            .await
            .unwrap();

        let games = store.fetch_all().await.unwrap();
        assert_eq!(games[0].url, "https://x/new");
        assert_eq!(games[1].url, "https://x/old");
    }

    #[tokio::test]
    async fn test_update_evaluation_unknown_url() {
        let store = GameStore::open_in_memory().await.unwrap();
        let err = store
            .update_evaluation("https://x/missing", &eval_data())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::GameNotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_by_url_missing_is_none() {
        let store = GameStore::open_in_memory().await.unwrap();
        assert!(store.fetch_by_url("https://x/none").await.unwrap().is_none());
    }
}
