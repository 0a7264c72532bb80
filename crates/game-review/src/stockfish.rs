//! Stockfish engine wrapper using UCI protocol (async I/O).
//!
//! The engine process is an exclusively-owned resource: one request in
//! flight at a time, enforced by `&mut self` on every query.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::debug;

use crate::error::ReviewError;

/// Candidate-move queries are capped at a small N.
pub const MAX_MULTIPV: u32 = 3;

/// Result of a single position evaluation, from the side to move's
/// perspective.
#[derive(Debug, Clone, Default)]
pub struct EngineEval {
    /// Centipawn score; `None` when the engine reports a forced mate
    /// (or no score at all).
    pub cp: Option<i32>,
    /// Mate in N moves (positive = side to move wins; 0 = side to move
    /// is mated).
    pub mate: Option<i32>,
    /// Win/draw/loss in permille, when the engine reports WDL stats.
    pub wdl: Option<(u32, u32, u32)>,
}

/// A single PV line from a multi-PV query.
#[derive(Debug, Clone)]
pub struct PvLine {
    /// Principal variation moves in UCI notation
    pub pv: Vec<String>,
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI.
    pub async fn new(path: &str) -> Result<Self, ReviewError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ReviewError::Engine(format!("Failed to spawn Stockfish at {path}: {e}")))?;

        let stdin = process.stdin.take().unwrap();
        let stdout = BufReader::new(process.stdout.take().unwrap());

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        // Configure for analysis; WDL stats are off by default.
        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("setoption name UCI_ShowWDL value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), ReviewError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| ReviewError::Engine(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ReviewError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Read one line from Stockfish
    async fn read_line(&mut self, line: &mut String) -> Result<(), ReviewError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| ReviewError::Engine(format!("Failed to read from Stockfish: {e}")))?;
        if n == 0 {
            return Err(ReviewError::Engine(
                "Stockfish closed its output stream".to_string(),
            ));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), ReviewError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Evaluate a position at a fixed search depth.
    pub async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<EngineEval, ReviewError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut result = EngineEval::default();
        let mut line = String::new();

        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            // Terminal positions report a score but no pv, so key off
            // the score keyword rather than the pv.
            if trimmed.starts_with("info") && trimmed.contains(" score ") {
                if let Some(cp) = parse_cp(trimmed) {
                    result.cp = Some(cp);
                    result.mate = None;
                }
                if let Some(mate) = parse_mate(trimmed) {
                    result.mate = Some(mate);
                    result.cp = None;
                }
                if let Some(wdl) = parse_wdl(trimmed) {
                    result.wdl = Some(wdl);
                }
            } else if trimmed.starts_with("bestmove") {
                break;
            }
        }

        Ok(result)
    }

    /// Ranked candidate best moves for a position, via MultiPV.
    /// `count` is capped at [`MAX_MULTIPV`].
    pub async fn top_moves(
        &mut self,
        fen: &str,
        depth: u32,
        count: u32,
    ) -> Result<Vec<PvLine>, ReviewError> {
        let count = count.clamp(1, MAX_MULTIPV);

        self.send(&format!("setoption name MultiPV value {count}")).await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut lines: Vec<PvLine> = vec![
            PvLine {
                pv: vec![],
                cp: None,
                mate: None
            };
            count as usize
        ];
        let mut line = String::new();

        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" pv ") {
                // multipv index is 1-based
                let pv_idx = parse_multipv_index(trimmed).unwrap_or(1).saturating_sub(1);
                if (pv_idx as usize) < lines.len() {
                    let entry = &mut lines[pv_idx as usize];
                    entry.cp = parse_cp(trimmed);
                    entry.mate = parse_mate(trimmed);
                    entry.pv = parse_pv(trimmed);
                }
            } else if trimmed.starts_with("bestmove") {
                break;
            }
        }

        // Reset MultiPV to 1
        self.send("setoption name MultiPV value 1").await?;

        // Positions with fewer legal moves than requested leave trailing
        // empty entries.
        lines.retain(|l| !l.pv.is_empty());
        Ok(lines)
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Parse an integer that follows `keyword` in an info line
fn parse_after(line: &str, keyword: &str) -> Option<i32> {
    let mut parts = line.split_whitespace();
    while let Some(part) = parts.next() {
        if part == keyword {
            return parts.next()?.parse().ok();
        }
    }
    None
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_after(line, "mate")
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    parse_after(line, "multipv").and_then(|v| u32::try_from(v).ok())
}

/// Parse win/draw/loss permille triple from info line
fn parse_wdl(line: &str) -> Option<(u32, u32, u32)> {
    let mut parts = line.split_whitespace();
    while let Some(part) = parts.next() {
        if part == "wdl" {
            let w = parts.next()?.parse().ok()?;
            let d = parts.next()?.parse().ok()?;
            let l = parts.next()?.parse().ok()?;
            return Some((w, d, l));
        }
    }
    None
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in line.split_whitespace() {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}
