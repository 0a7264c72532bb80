//! Move replay engine: board reconstruction from a game's move list.
//!
//! Jumps rebuild the position from the initial board rather than undoing
//! moves in place. O(k) per jump, which is cheap at game length and
//! immune to stateful undo bugs.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{Chess, EnPassantMode, Move, Position};

use crate::error::GameError;
use crate::pgn;

/// Parse and validate the mainline moves of one game by replaying its
/// SAN tokens from the standard starting position.
pub fn parse_moves(pgn_text: &str) -> Result<Vec<Move>, GameError> {
    let mut pos = Chess::default();
    let mut moves = Vec::new();

    for token in pgn::san_tokens(pgn_text) {
        let san: SanPlus = token
            .parse()
            .map_err(|_| GameError::InvalidSan(token.clone()))?;
        let m = san.san.to_move(&pos).map_err(|_| GameError::IllegalMove {
            san: token,
            ply: moves.len(),
        })?;
        pos.play_unchecked(m);
        moves.push(m);
    }

    Ok(moves)
}

/// FEN of every position of the game: the starting position (ply 0)
/// followed by the position after each move.
pub fn position_fens(moves: &[Move]) -> Vec<String> {
    let mut pos = Chess::default();
    let mut fens = Vec::with_capacity(moves.len() + 1);
    fens.push(Fen::from_position(&pos, EnPassantMode::Legal).to_string());
    for m in moves {
        pos.play_unchecked(*m);
        fens.push(Fen::from_position(&pos, EnPassantMode::Legal).to_string());
    }
    fens
}

/// Cursor over one game's move list. The move list is fixed for the
/// lifetime of the state; selecting a different game builds a new one.
///
/// Invariant: `position()` always equals the starting position with
/// `moves[0..index)` applied, in order.
#[derive(Debug, Clone)]
pub struct ReplayState {
    moves: Vec<Move>,
    index: usize,
    board: Chess,
}

impl ReplayState {
    pub fn new(moves: Vec<Move>) -> Self {
        Self {
            moves,
            index: 0,
            board: Chess::default(),
        }
    }

    pub fn from_pgn(pgn_text: &str) -> Result<Self, GameError> {
        Ok(Self::new(parse_moves(pgn_text)?))
    }

    /// Total number of plies in the game.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Current cursor position in `[0, len()]`.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> &Chess {
        &self.board
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.board, EnPassantMode::Legal).to_string()
    }

    /// Apply the next move. Returns false at the final position.
    pub fn next(&mut self) -> bool {
        if self.index >= self.moves.len() {
            return false;
        }
        self.board.play_unchecked(self.moves[self.index]);
        self.index += 1;
        true
    }

    /// Step back one move. Returns false at the starting position.
    pub fn prev(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.jump_to(self.index - 1);
        true
    }

    /// Move the cursor to ply `k`, clamped to `[0, len()]`, by replaying
    /// from the starting position.
    pub fn jump_to(&mut self, k: usize) {
        let k = k.min(self.moves.len());
        let mut board = Chess::default();
        for m in &self.moves[..k] {
            board.play_unchecked(*m);
        }
        self.board = board;
        self.index = k;
    }

    pub fn to_start(&mut self) {
        self.jump_to(0);
    }

    pub fn to_end(&mut self) {
        self.jump_to(self.moves.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHOLARS_MATE: &str = "1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0";

    #[test]
    fn test_parse_moves_mainline() {
        let moves = parse_moves(SCHOLARS_MATE).unwrap();
        assert_eq!(moves.len(), 7);
    }

    #[test]
    fn test_parse_moves_rejects_illegal() {
        let err = parse_moves("1. e4 e4 *").unwrap_err();
        assert!(matches!(err, GameError::IllegalMove { ply: 1, .. }));
    }

    #[test]
    fn test_position_fens_covers_every_ply() {
        let moves = parse_moves(SCHOLARS_MATE).unwrap();
        let fens = position_fens(&moves);
        assert_eq!(fens.len(), moves.len() + 1);
        assert_eq!(
            fens[0],
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
    }

    #[test]
    fn test_jump_matches_stepping() {
        let moves = parse_moves(SCHOLARS_MATE).unwrap();
        let n = moves.len();

        for k in 0..=n {
            let mut stepped = ReplayState::new(moves.clone());
            for _ in 0..k {
                assert!(stepped.next());
            }

            let mut jumped = ReplayState::new(moves.clone());
            jumped.jump_to(k);

            assert_eq!(jumped.index(), k);
            assert_eq!(jumped.fen(), stepped.fen(), "diverged at ply {k}");
        }
    }

    #[test]
    fn test_next_prev_bounds() {
        let mut state = ReplayState::from_pgn("1. e4 e5 *").unwrap();
        assert!(!state.prev());
        assert!(state.next());
        assert!(state.next());
        assert!(!state.next());
        assert_eq!(state.index(), 2);
        assert!(state.prev());
        assert_eq!(state.index(), 1);
    }

    #[test]
    fn test_prev_restores_position() {
        let mut state = ReplayState::from_pgn(SCHOLARS_MATE).unwrap();
        let start_fen = state.fen();
        state.next();
        state.next();
        state.prev();
        state.prev();
        assert_eq!(state.fen(), start_fen);
    }

    #[test]
    fn test_jump_clamps_past_end() {
        let mut state = ReplayState::from_pgn("1. e4 e5 *").unwrap();
        state.jump_to(99);
        assert_eq!(state.index(), 2);
    }

    #[test]
    fn test_empty_move_list() {
        let mut state = ReplayState::new(Vec::new());
        assert!(state.is_empty());
        assert!(!state.next());
        assert!(!state.prev());
        state.to_end();
        assert_eq!(state.index(), 0);
    }
}
