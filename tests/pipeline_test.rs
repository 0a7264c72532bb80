//! End-to-end pipeline: parse a raw archive batch, store it, replay a
//! game and build rating history from the stored rows.

use std::collections::HashSet;

use game_core::rating::{self, RatingWindow};
use game_core::replay::ReplayState;
use game_core::{pgn, EvaluationData};
use game_review::db::GameStore;

const ARCHIVE: &str = r#"[Event "Live Chess"]
[Site "Chess.com"]
[White "alice"]
[Black "bob"]
[Result "1-0"]
[WhiteElo "1510"]
[BlackElo "1400"]
[TimeControl "600"]
[EndDate "2024.01.01"]
[EndTime "12:00:00"]
[Link "https://www.chess.com/game/live/1"]

1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0

[Event "Live Chess"]
[Site "Chess.com"]
[White "carl"]
[Black "alice"]
[Result "0-1"]
[WhiteElo "1600"]
[BlackElo "1490"]
[TimeControl "180"]
[EndDate "2024.01.02"]
[EndTime "09:30:00"]
[Link "https://www.chess.com/game/live/2"]

1. f3 e5 2. g4 Qh4# 0-1
"#;

#[tokio::test]
async fn test_parse_store_and_list() {
    let records = pgn::parse_games(ARCHIVE);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "https://www.chess.com/game/live/1");
    assert_eq!(records[0].end_time, 1_704_110_400);
    // stored pgn is the archive text verbatim
    assert!(records[0].pgn.starts_with("[Event \"Live Chess\"]"));
    assert!(records[0].pgn.contains("4. Qxf7# 1-0"));

    let store = GameStore::open_in_memory().await.unwrap();
    assert_eq!(store.upsert(&records).await.unwrap(), 2);

    let games = store.fetch_all().await.unwrap();
    // newest first
    assert_eq!(games[0].url, "https://www.chess.com/game/live/2");
    assert_eq!(games[1].white, "alice");
}

#[tokio::test]
async fn test_refetch_is_idempotent_and_keeps_evaluation() {
    let records = pgn::parse_games(ARCHIVE);
    let store = GameStore::open_in_memory().await.unwrap();
    store.upsert(&records).await.unwrap();

    let data = EvaluationData {
        scores: vec![0.0; 8],
        is_mate: vec![false; 8],
        wdl_probs: vec![(0.3, 0.5, 0.2); 8],
        depth: 10,
    };
    store
        .update_evaluation("https://www.chess.com/game/live/1", &data)
        .await
        .unwrap();

    // refetching the same month inserts nothing and touches nothing
    assert_eq!(store.upsert(&records).await.unwrap(), 0);
    let stored = store
        .fetch_by_url("https://www.chess.com/game/live/1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.evaluation, Some(data));
}

#[tokio::test]
async fn test_replay_stored_game() {
    let records = pgn::parse_games(ARCHIVE);
    let store = GameStore::open_in_memory().await.unwrap();
    store.upsert(&records).await.unwrap();

    let game = store
        .fetch_by_url("https://www.chess.com/game/live/1")
        .await
        .unwrap()
        .unwrap();
    let mut replay = ReplayState::from_pgn(&game.pgn).unwrap();
    assert_eq!(replay.len(), 7);

    // jumping must land on the same position as stepping
    let mut stepped = replay.clone();
    for _ in 0..5 {
        assert!(stepped.next());
    }
    replay.jump_to(5);
    assert_eq!(replay.fen(), stepped.fen());
}

#[tokio::test]
async fn test_rating_history_from_store() {
    let records = pgn::parse_games(ARCHIVE);
    let store = GameStore::open_in_memory().await.unwrap();
    store.upsert(&records).await.unwrap();

    let games = store.fetch_all().await.unwrap();
    let points = rating::history("ALICE", &games);
    assert_eq!(points.len(), 2);
    // sorted by date: game 1 first, then game 2 where alice was black
    assert_eq!(points[0].rating, 1510);
    assert_eq!(points[1].rating, 1490);

    let windowed = rating::select(&points, RatingWindow::new(2, 2), None);
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].rating, 1490);

    let blitz: HashSet<String> = ["180".to_string()].into();
    let filtered = rating::select(&points, RatingWindow::full(points.len()), Some(&blitz));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].time_control, "180");

    assert!(rating::select(&points, RatingWindow::new(5, 9), None).is_empty());
}
