//! PGN batch parsing — lightweight regex-based extraction.
//!
//! Archive data routinely has edge cases (ongoing games, redacted tags),
//! so this parser is deliberately permissive: best-effort extraction,
//! never strict grammar validation. Records with degraded fields are
//! still emitted; only blank blocks are dropped.

use chrono::NaiveDateTime;
use regex::Regex;

use crate::record::GameRecord;

/// Typed view of a game's bracketed tag section. Derived on demand from
/// the stored PGN text, never persisted separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PgnTags {
    pub event: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<String>,
    pub black_elo: Option<String>,
    pub time_control: Option<String>,
    pub termination: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub end_date: Option<String>,
    pub utc_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub utc_time: Option<String>,
}

impl PgnTags {
    /// Extract all `[Key "Value"]` pairs from a game block. Blocks with
    /// no matches yield an empty (all-`None`) tag set.
    pub fn parse(pgn: &str) -> Self {
        let header_re = match Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#) {
            Ok(re) => re,
            Err(_) => return Self::default(),
        };

        let mut tags = Self::default();
        for cap in header_re.captures_iter(pgn) {
            let value = cap[2].to_string();
            match &cap[1] {
                "Event" => tags.event = Some(value),
                "White" => tags.white = Some(value),
                "Black" => tags.black = Some(value),
                "Result" => tags.result = Some(value),
                "WhiteElo" => tags.white_elo = Some(value),
                "BlackElo" => tags.black_elo = Some(value),
                "TimeControl" => tags.time_control = Some(value),
                "Termination" => tags.termination = Some(value),
                "Link" => tags.link = Some(value),
                "Date" => tags.date = Some(value),
                "EndDate" => tags.end_date = Some(value),
                "UTCDate" => tags.utc_date = Some(value),
                "StartTime" => tags.start_time = Some(value),
                "EndTime" => tags.end_time = Some(value),
                "UTCTime" => tags.utc_time = Some(value),
                _ => {}
            }
        }
        tags
    }

    /// Completion timestamp in UTC seconds. Fallback order:
    /// `EndDate`+`EndTime`, `UTCDate`+`UTCTime`, `Date`+`StartTime`.
    /// Returns 0 when any required field is missing or malformed.
    pub fn end_timestamp(&self) -> i64 {
        let date = self
            .end_date
            .as_deref()
            .or(self.utc_date.as_deref())
            .or(self.date.as_deref());
        let time = self
            .end_time
            .as_deref()
            .or(self.utc_time.as_deref())
            .or(self.start_time.as_deref());

        let (Some(date), Some(time)) = (date, time) else {
            return 0;
        };

        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y.%m.%d %H:%M:%S")
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0)
    }

    /// Rating tag for the side `player` was on, case-insensitively.
    /// `None` when the player did not take part, or the tag is missing
    /// or non-numeric.
    pub fn rating_for(&self, player: &str) -> Option<i32> {
        let elo = if self
            .white
            .as_deref()
            .is_some_and(|w| w.eq_ignore_ascii_case(player))
        {
            self.white_elo.as_deref()
        } else if self
            .black
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case(player))
        {
            self.black_elo.as_deref()
        } else {
            None
        };
        elo.and_then(|e| e.parse().ok())
    }
}

/// Split a raw multi-game archive blob into one record per game block.
/// Blocks begin at every `[Event` tag found at the start of a line; the
/// marker stays with the block that follows it. Blank blocks are skipped.
pub fn parse_games(raw: &str) -> Vec<GameRecord> {
    split_blocks(raw)
        .into_iter()
        .map(|block| {
            let tags = PgnTags::parse(block);
            GameRecord {
                url: tags.link.clone().unwrap_or_default(),
                pgn: block.to_string(),
                end_time: tags.end_timestamp(),
                white: tags.white.clone().unwrap_or_default(),
                black: tags.black.clone().unwrap_or_default(),
                time_control: tags.time_control.clone().unwrap_or_default(),
                evaluation: None,
            }
        })
        .collect()
}

/// Slice the raw text at every line-initial `[Event`, preserving each
/// block's original bytes. Text before the first marker is its own block
/// so that batches without an `Event` tag still yield a record.
fn split_blocks(raw: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = raw
        .match_indices("[Event")
        .filter(|(idx, _)| *idx == 0 || raw.as_bytes()[idx - 1] == b'\n')
        .map(|(idx, _)| idx)
        .collect();

    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    let mut blocks = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(raw.len());
        let block = raw[start..end].trim();
        if !block.is_empty() {
            blocks.push(block);
        }
    }
    blocks
}

/// Extract the SAN move tokens from one game's movetext, in order.
/// Headers, comments, variations and NAG suffixes are stripped first;
/// move numbers and result markers are ignored.
pub fn san_tokens(pgn: &str) -> Vec<String> {
    let movetext = strip_non_moves(pgn);

    movetext
        .split_whitespace()
        .filter(|token| {
            !token.ends_with('.')
                && !token.contains("...")
                && *token != "1-0"
                && *token != "0-1"
                && *token != "1/2-1/2"
                && *token != "*"
        })
        .map(|token| token.trim_end_matches(['!', '?']).to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Number of plies in one game's movetext. Counts tokens only; it does
/// not validate them against a board.
pub fn count_plies(pgn: &str) -> usize {
    san_tokens(pgn).len()
}

fn strip_non_moves(pgn: &str) -> String {
    let mut text = pgn.to_string();
    for pattern in [r"\[[^\]]*\]", r"\{[^}]*\}", r"\([^)]*\)", r"\$\d+"] {
        if let Ok(re) = Regex::new(pattern) {
            text = re.replace_all(&text, " ").into_owned();
        }
    }
    text
}
