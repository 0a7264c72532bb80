//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Invalid SAN token '{0}'")]
    InvalidSan(String),

    #[error("Illegal move '{san}' at ply {ply}")]
    IllegalMove { san: String, ply: usize },
}
