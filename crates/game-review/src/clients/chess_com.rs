//! Chess.com public API client: monthly PGN archives.

use reqwest::{Client, StatusCode};

use crate::error::ReviewError;

pub struct ChessComClient {
    client: Client,
}

impl ChessComClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("game-review/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();
        Self { client }
    }

    /// Fetch the raw PGN batch for one month of a player's games.
    ///
    /// Returns `Ok(None)` when the archive has no games for that period
    /// (HTTP 404); every other HTTP or transport failure is surfaced as
    /// an archive error naming the attempted request.
    pub async fn fetch_month_pgn(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<String>, ReviewError> {
        // The API path is case-sensitive and expects lowercase names.
        let url = format!(
            "https://api.chess.com/pub/player/{}/games/{}/{:02}/pgn",
            username.to_lowercase(),
            year,
            month
        );

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/x-chess-pgn")
            .send()
            .await
            .map_err(|e| ReviewError::Archive(format!("request to {url} failed: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ReviewError::Archive(format!(
                "HTTP {} fetching {url}",
                resp.status()
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| ReviewError::Archive(format!("reading body of {url}: {e}")))?;

        Ok(Some(text))
    }
}

impl Default for ChessComClient {
    fn default() -> Self {
        Self::new()
    }
}
