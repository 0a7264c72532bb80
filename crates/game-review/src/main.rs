use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use game_core::pgn::PgnTags;
use game_core::rating::RatingWindow;

use game_review::config::Config;
use game_review::evaluator::{self, EvalProgress};
use game_review::session::Session;
use game_review::stockfish::StockfishEngine;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    let config = Config::from_env().context("Failed to load configuration")?;
    let mut session = Session::open(&config).await?;

    match command {
        "fetch" => {
            let (parsed, inserted) = match (args.get(1), args.get(2)) {
                (Some(y), Some(m)) => {
                    let year: i32 = y.parse().context("year must be a number")?;
                    let month: u32 = m.parse().context("month must be 1-12")?;
                    session.fetch_month(year, month).await?
                }
                _ => session.fetch_current_month().await?,
            };
            println!("Parsed {parsed} games, {inserted} new");
        }
        "games" => {
            let games = session.store().fetch_all().await?;
            if games.is_empty() {
                println!("No games stored. Run `fetch` first.");
                return Ok(());
            }
            for game in &games {
                let tags = PgnTags::parse(&game.pgn);
                let result = tags.result.unwrap_or_else(|| "*".to_string());
                let white_elo = tags.white_elo.unwrap_or_else(|| "?".to_string());
                let black_elo = tags.black_elo.unwrap_or_else(|| "?".to_string());
                let evaluated = if game.evaluation.is_some() { " [evaluated]" } else { "" };
                println!(
                    "{:<10} {} ({}) vs {} ({})  tc={} plies={}{}\n  {}",
                    result,
                    game.white,
                    white_elo,
                    game.black,
                    black_elo,
                    game.time_control,
                    game_core::pgn::count_plies(&game.pgn),
                    evaluated,
                    game.url
                );
            }
        }
        "show" => {
            let url = args.get(1).context("usage: show <url> [ply]")?;
            let (record, mut replay) = session.select_game(url).await?;
            let ply = args
                .get(2)
                .map(|p| p.parse::<usize>())
                .transpose()
                .context("ply must be a number")?
                .unwrap_or(replay.len());
            replay.jump_to(ply);

            println!("{} vs {}  (ply {}/{})", record.white, record.black, replay.index(), replay.len());
            println!("{}", render_board(&replay.fen()));
            if let Some(eval) = &record.evaluation {
                if let (Some(score), Some(mate)) = (
                    eval.scores.get(replay.index()),
                    eval.is_mate.get(replay.index()),
                ) {
                    let label = if *mate { " (forced mate)" } else { "" };
                    println!("Eval: {score:+.2}{label}  (depth {})", eval.depth);
                }
            }
        }
        "evaluate" => {
            let url = args.get(1).context("usage: evaluate <url> [depth]")?;
            let depth = args
                .get(2)
                .map(|d| d.parse::<u32>())
                .transpose()
                .context("depth must be a number")?
                .unwrap_or(config.eval_depth);

            let (record, _) = session.select_game(url).await?;

            let mut engine = StockfishEngine::new(&config.stockfish_path).await?;
            let (tx, mut rx) = mpsc::unbounded_channel::<EvalProgress>();
            let printer = tokio::spawn(async move {
                while let Some(p) = rx.recv().await {
                    print!("\rAnalyzing position {}/{}", p.position, p.total);
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                }
                println!();
            });

            let result = evaluator::evaluate_and_store(
                &mut engine,
                session.store(),
                &record,
                session.username(),
                depth,
                Some(&tx),
            )
            .await;
            drop(tx);
            let _ = printer.await;
            engine.quit().await;

            let data = result?;
            println!("Evaluated {} positions at depth {depth}", data.positions());
        }
        "best" => {
            let url = args.get(1).context("usage: best <url> [ply] [count]")?;
            let (_, mut replay) = session.select_game(url).await?;
            let ply = args
                .get(2)
                .map(|p| p.parse::<usize>())
                .transpose()
                .context("ply must be a number")?
                .unwrap_or(0);
            let count = args
                .get(3)
                .map(|c| c.parse::<u32>())
                .transpose()
                .context("count must be a number")?
                .unwrap_or(3);
            replay.jump_to(ply);

            let mut engine = StockfishEngine::new(&config.stockfish_path).await?;
            let lines = engine.top_moves(&replay.fen(), config.eval_depth, count).await;
            engine.quit().await;

            for (i, line) in lines?.iter().enumerate() {
                let score = match (line.cp, line.mate) {
                    (_, Some(mate)) => format!("mate {mate}"),
                    (Some(cp), _) => format!("{:+.2}", f64::from(cp) / 100.0),
                    _ => "?".to_string(),
                };
                println!("{}. {}  ({score})", i + 1, line.pv.join(" "));
            }
        }
        "history" => {
            let player = args.get(1).context("usage: history <player> [start end] [tc,tc]")?;
            let window = match (args.get(2), args.get(3)) {
                (Some(s), Some(e)) => Some(RatingWindow::new(
                    s.parse().context("start must be a number")?,
                    e.parse().context("end must be a number")?,
                )),
                _ => None,
            };
            let enabled: Option<HashSet<String>> = args
                .get(4)
                .map(|csv| csv.split(',').map(str::to_string).collect());

            let points = session
                .rating_history(player, window, enabled.as_ref())
                .await?;
            if points.is_empty() {
                println!("No rating points for {player}");
                return Ok(());
            }
            for point in &points {
                println!(
                    "{}  {:>4}  ({})",
                    point.date.format("%Y-%m-%d %H:%M"),
                    point.rating,
                    point.time_control
                );
            }
        }
        other => {
            print_usage();
            bail!("Unknown command: {other}");
        }
    }

    Ok(())
}

fn print_usage() {
    println!("Usage: game-review <command>");
    println!();
    println!("Commands:");
    println!("  fetch [year month]              Fetch a monthly archive (default: current month)");
    println!("  games                           List stored games, newest first");
    println!("  show <url> [ply]                Show the board at a ply (default: final position)");
    println!("  evaluate <url> [depth]          Run Stockfish over every position and store the result");
    println!("  best <url> [ply] [count]        Top candidate moves at a ply");
    println!("  history <player> [start end] [tc,tc]   Rating history, optionally windowed/filtered");
}

/// Render the piece-placement field of a FEN as an 8x8 ASCII board,
/// White at the bottom.
fn render_board(fen: &str) -> String {
    let placement = fen.split_whitespace().next().unwrap_or("");
    let mut out = String::new();

    for (i, rank) in placement.split('/').enumerate() {
        out.push_str(&format!("{} |", 8 - i));
        for c in rank.chars() {
            if let Some(n) = c.to_digit(10) {
                for _ in 0..n {
                    out.push_str(" .");
                }
            } else {
                out.push(' ');
                out.push(c);
            }
        }
        out.push('\n');
    }
    out.push_str("   ----------------\n");
    out.push_str("   a b c d e f g h");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_board_start_position() {
        let board = render_board("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        let lines: Vec<&str> = board.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "8 | r n b q k b n r");
        assert_eq!(lines[2], "6 | . . . . . . . .");
        assert_eq!(lines[7], "1 | R N B Q K B N R");
    }
}
