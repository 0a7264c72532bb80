//! Application error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chess.com archive error: {0}")]
    Archive(String),

    #[error("Stockfish error: {0}")]
    Engine(String),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Game error: {0}")]
    Game(#[from] game_core::GameError),
}
