//! Game evaluation pipeline.
//!
//! Walks every position of a game through Stockfish and produces one
//! score, mate flag, and WDL triple per position, all from the tracked
//! player's point of view. Results are persisted only after the whole
//! game succeeds; a failure mid-run discards the partial data. Running
//! at most one evaluation per game at a time is the caller's
//! responsibility.

use game_core::shakmaty::Color;
use game_core::{replay, EvaluationData, GameRecord};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::db::GameStore;
use crate::error::ReviewError;
use crate::stockfish::{EngineEval, StockfishEngine};

/// Saturation value, in pawns, for forced-mate scores.
pub const MATE_SCORE: f64 = 100.0;

/// Progress of an in-flight evaluation, 1-based over `total` positions.
#[derive(Debug, Clone, Copy)]
pub struct EvalProgress {
    pub position: usize,
    pub total: usize,
}

/// The color the tracked player held in this game. A game where the
/// player held neither seat is scored from White's point of view.
pub fn pov_color(record: &GameRecord, tracked_user: &str) -> Color {
    if record.black.eq_ignore_ascii_case(tracked_user) {
        Color::Black
    } else {
        Color::White
    }
}

/// Convert an engine score (side to move's perspective) into pawns from
/// `pov`'s perspective. Forced mates saturate at `MATE_SCORE`; a mate
/// score of 0 means the side to move has been mated.
fn score_from_pov(eval: &EngineEval, turn: Color, pov: Color) -> (f64, bool) {
    let sign = if turn == pov { 1.0 } else { -1.0 };

    if let Some(mate) = eval.mate {
        let stm_score = if mate > 0 { MATE_SCORE } else { -MATE_SCORE };
        return (sign * stm_score, true);
    }
    if let Some(cp) = eval.cp {
        return (sign * f64::from(cp) / 100.0, false);
    }
    (0.0, false)
}

/// Convert engine WDL permilles (side to move's perspective) into
/// probabilities from `pov`'s perspective. Positions where the engine
/// reports no WDL default to a certain draw.
fn wdl_from_pov(eval: &EngineEval, turn: Color, pov: Color) -> (f64, f64, f64) {
    let (w, d, l) = eval.wdl.unwrap_or((0, 1000, 0));
    let (w, d, l) = (
        f64::from(w) / 1000.0,
        f64::from(d) / 1000.0,
        f64::from(l) / 1000.0,
    );
    if turn == pov {
        (w, d, l)
    } else {
        (l, d, w)
    }
}

/// Evaluate every position of `record` at a fixed depth.
///
/// Position `i` of the result is the board before move `i` was played
/// (position 0 is the initial board), so a game of N plies yields N+1
/// entries. Progress, when a sender is given, is reported once per
/// position; a dropped receiver does not abort the run.
pub async fn evaluate_game(
    engine: &mut StockfishEngine,
    record: &GameRecord,
    tracked_user: &str,
    depth: u32,
    progress: Option<&UnboundedSender<EvalProgress>>,
) -> Result<EvaluationData, ReviewError> {
    let moves = replay::parse_moves(&record.pgn)?;
    let fens = replay::position_fens(&moves);
    let pov = pov_color(record, tracked_user);

    let mut data = EvaluationData::with_capacity(fens.len(), depth);

    for (i, fen) in fens.iter().enumerate() {
        if let Some(tx) = progress {
            let _ = tx.send(EvalProgress {
                position: i + 1,
                total: fens.len(),
            });
        }

        // Even plies have White to move
        let turn = if i % 2 == 0 { Color::White } else { Color::Black };
        let eval = engine.evaluate(fen, depth).await?;

        let (score, is_mate) = score_from_pov(&eval, turn, pov);
        data.scores.push(score);
        data.is_mate.push(is_mate);
        data.wdl_probs.push(wdl_from_pov(&eval, turn, pov));
    }

    Ok(data)
}

/// Evaluate a game and persist the result in one write.
pub async fn evaluate_and_store(
    engine: &mut StockfishEngine,
    store: &GameStore,
    record: &GameRecord,
    tracked_user: &str,
    depth: u32,
    progress: Option<&UnboundedSender<EvalProgress>>,
) -> Result<EvaluationData, ReviewError> {
    let data = evaluate_game(engine, record, tracked_user, depth, progress).await?;
    store.update_evaluation(&record.url, &data).await?;
    info!(url = %record.url, positions = data.positions(), depth, "Stored game evaluation");
    Ok(data)
}
