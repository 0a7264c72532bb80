pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod session;
pub mod stockfish;
