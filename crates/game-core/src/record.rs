//! Game record types shared between the parser, the store and the
//! evaluation pipeline.

use serde::{Deserialize, Serialize};

/// One played game. `pgn` is the authoritative text; `end_time`, the
/// player names and `time_control` are denormalized extracts from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    /// Archive URL of the game, stable across refetches. Primary key.
    pub url: String,
    /// Full tag section + movetext, verbatim from the archive.
    pub pgn: String,
    /// UTC timestamp of game completion; 0 when unparseable.
    pub end_time: i64,
    pub white: String,
    pub black: String,
    pub time_control: String,
    /// Per-position engine evaluation, absent until computed.
    pub evaluation: Option<EvaluationData>,
}

impl GameRecord {
    /// Case-insensitive check whether `player` took part in this game.
    pub fn involves(&self, player: &str) -> bool {
        self.white.eq_ignore_ascii_case(player) || self.black.eq_ignore_ascii_case(player)
    }
}

/// Serialized per-position evaluation of one game: one entry per ply,
/// including the starting position (ply 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationData {
    /// Score in pawns from the tracked player's point of view; forced
    /// mates are recorded as a saturated value, see `is_mate`.
    pub scores: Vec<f64>,
    pub is_mate: Vec<bool>,
    /// Win/draw/loss probabilities in [0, 1].
    pub wdl_probs: Vec<(f64, f64, f64)>,
    /// Search depth the run was computed at.
    pub depth: u32,
}

impl EvaluationData {
    pub fn with_capacity(positions: usize, depth: u32) -> Self {
        Self {
            scores: Vec::with_capacity(positions),
            is_mate: Vec::with_capacity(positions),
            wdl_probs: Vec::with_capacity(positions),
            depth,
        }
    }

    /// Number of evaluated positions (plies + 1 for a complete run).
    pub fn positions(&self) -> usize {
        self.scores.len()
    }

    /// All three arrays must stay in lockstep; a violation means a
    /// truncated or corrupted blob.
    pub fn is_consistent(&self) -> bool {
        self.scores.len() == self.is_mate.len() && self.scores.len() == self.wdl_probs.len()
    }
}
