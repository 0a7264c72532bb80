//! Rating history derived from stored games.
//!
//! Rebuilding the history rescans every game and re-parses its tag
//! section, so the sorted per-player sequence is built once and cached
//! ([`RatingCache`]); windowing and time-control filtering operate on
//! the cached sequence without recomputing it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::pgn::PgnTags;
use crate::record::GameRecord;

/// One (date, rating) observation for a player, from a single game.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingPoint {
    pub date: DateTime<Utc>,
    pub rating: i32,
    pub time_control: String,
}

/// Build the full rating history for `player`, sorted by date ascending.
/// Games the player did not take part in, and games whose matching
/// rating tag is missing or non-numeric, are skipped.
pub fn history(player: &str, games: &[GameRecord]) -> Vec<RatingPoint> {
    let mut points: Vec<RatingPoint> = games
        .iter()
        .filter(|g| g.involves(player))
        .filter_map(|g| {
            let tags = PgnTags::parse(&g.pgn);
            let rating = tags.rating_for(player)?;
            let date = DateTime::<Utc>::from_timestamp(g.end_time, 0)?;
            let time_control = tags
                .time_control
                .unwrap_or_else(|| "Unknown".to_string());
            Some(RatingPoint {
                date,
                rating,
                time_control,
            })
        })
        .collect();

    points.sort_by_key(|p| p.date);
    points
}

/// Contiguous index window over a sorted rating sequence, 1-based and
/// inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingWindow {
    pub start: usize,
    pub end: usize,
}

impl RatingWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Window covering an entire sequence of `len` points.
    pub fn full(len: usize) -> Self {
        Self {
            start: 1,
            end: len.max(1),
        }
    }

    /// Resolve out-of-order bounds by pulling the violating bound toward
    /// the other one.
    fn normalized(self) -> (usize, usize) {
        if self.start > self.end {
            (self.end, self.end)
        } else {
            (self.start, self.end)
        }
    }
}

/// Apply the index window and the enabled time-control set to a sorted
/// sequence, preserving order. `None` for `enabled` means all categories
/// are enabled. An empty result is a valid, non-error outcome.
pub fn select(
    points: &[RatingPoint],
    window: RatingWindow,
    enabled: Option<&HashSet<String>>,
) -> Vec<RatingPoint> {
    let (start, end) = window.normalized();
    if start > points.len() || end == 0 {
        return Vec::new();
    }

    let lo = start.saturating_sub(1);
    let hi = end.min(points.len());

    points[lo..hi]
        .iter()
        .filter(|p| enabled.is_none_or(|set| set.contains(&p.time_control)))
        .cloned()
        .collect()
}

/// Single-entry cache of the sorted rating sequence for one player.
/// Invalidated when the tracked player or the underlying store contents
/// change; filtering and windowing never touch it.
#[derive(Debug, Default)]
pub struct RatingCache {
    player: Option<String>,
    points: Vec<RatingPoint>,
}

impl RatingCache {
    pub fn contains(&self, player: &str) -> bool {
        self.player
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(player))
    }

    pub fn get(&self, player: &str) -> Option<&[RatingPoint]> {
        self.contains(player).then_some(self.points.as_slice())
    }

    pub fn put(&mut self, player: &str, points: Vec<RatingPoint>) {
        self.player = Some(player.to_string());
        self.points = points;
    }

    pub fn invalidate(&mut self) {
        self.player = None;
        self.points.clear();
    }
}
