//! One-shot pull of tournament status and leaderboard.
//!
//! Used at startup to seed state before the stream delivers its own
//! `initial_state`, or in case it never does. A failed fetch is returned to
//! the caller and never retried here.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::protocol::{Snapshot, Team, Tournament};

const STATUS_PATH: &str = "tournament/status";
const LEADERBOARD_PATH: &str = "leaderboard";

/// Fetches a [`Snapshot`] from the REST endpoints.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    http: reqwest::Client,
    status_url: String,
    leaderboard_url: String,
}

impl SnapshotLoader {
    /// Build a loader for the endpoints under `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::InvalidUrl`] for a malformed base URL, or
    /// [`LiveError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &LiveConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout)
            .build()
            .map_err(|e| LiveError::Http(e.to_string()))?;
        Ok(Self {
            http,
            status_url: config.http_url(STATUS_PATH)?,
            leaderboard_url: config.http_url(LEADERBOARD_PATH)?,
        })
    }

    /// `GET /tournament/status`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::HttpStatus`] on a non-success response,
    /// [`LiveError::Serialization`] on an undecodable body, or
    /// [`LiveError::Http`] / [`LiveError::Timeout`] if the request fails.
    pub async fn fetch_tournament(&self) -> Result<Tournament> {
        self.get_json(&self.status_url).await
    }

    /// `GET /leaderboard`.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_tournament`](Self::fetch_tournament).
    pub async fn fetch_leaderboard(&self) -> Result<Vec<Team>> {
        self.get_json(&self.leaderboard_url).await
    }

    /// Fetch both endpoints concurrently. Fails if either fails.
    ///
    /// # Errors
    ///
    /// The first error from either request.
    pub async fn fetch(&self) -> Result<Snapshot> {
        let (tournament, leaderboard) =
            tokio::try_join!(self.fetch_tournament(), self.fetch_leaderboard())?;
        debug!(
            status = ?tournament.status,
            teams = leaderboard.len(),
            "snapshot fetched"
        );
        Ok(Snapshot {
            tournament: Some(tournament),
            leaderboard,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LiveError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
