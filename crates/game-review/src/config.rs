//! Configuration from environment variables

use std::env;

use crate::error::ReviewError;

#[derive(Clone, Debug)]
pub struct Config {
    /// Tracked Chess.com username
    pub username: String,

    /// Path to the SQLite database file (derived from the username when
    /// not set explicitly)
    pub database_path: String,

    /// Path to the Stockfish binary
    pub stockfish_path: String,

    /// Default search depth for evaluation runs
    pub eval_depth: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ReviewError> {
        let username = env::var("CHESS_USERNAME")
            .map_err(|_| ReviewError::Config("CHESS_USERNAME not set"))?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| default_database_path(&username));

        let stockfish_path = env::var("STOCKFISH_PATH")
            .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string());

        let eval_depth = env::var("EVAL_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            username,
            database_path,
            stockfish_path,
            eval_depth,
        })
    }
}

/// Database file derived from the username, made filesystem-friendly.
pub fn default_database_path(username: &str) -> String {
    format!("{}_games.db", username.to_lowercase().replace(' ', "_"))
}
