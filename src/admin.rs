//! Admin pause/resume actions.
//!
//! Each request carries the admin credential in a header (see
//! [`LiveConfig::admin_header`]). A 401 answer maps to
//! [`LiveError::InvalidCredential`] so callers can show a distinct message via
//! [`LiveError::user_message`]; any other failure is a generic error.

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::config::LiveConfig;
use crate::error::{LiveError, Result};

/// Sends admin control requests to the tournament service.
#[derive(Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    pause_url: String,
    resume_url: String,
    header: String,
    credential: String,
}

impl AdminClient {
    /// # Errors
    ///
    /// Returns [`LiveError::InvalidUrl`] for a malformed base URL, or
    /// [`LiveError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &LiveConfig, credential: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout)
            .build()
            .map_err(|e| LiveError::Http(e.to_string()))?;
        Ok(Self {
            http,
            pause_url: config.http_url("tournament/pause")?,
            resume_url: config.http_url("tournament/resume")?,
            header: config.admin_header.clone(),
            credential: credential.into(),
        })
    }

    /// `POST /tournament/pause`.
    ///
    /// # Errors
    ///
    /// [`LiveError::InvalidCredential`] on 401, [`LiveError::HttpStatus`] on
    /// any other non-success status, [`LiveError::Http`] /
    /// [`LiveError::Timeout`] if the request fails.
    pub async fn pause(&self) -> Result<()> {
        self.post(&self.pause_url, "pause").await
    }

    /// `POST /tournament/resume`.
    ///
    /// # Errors
    ///
    /// Same as [`pause`](Self::pause).
    pub async fn resume(&self) -> Result<()> {
        self.post(&self.resume_url, "resume").await
    }

    async fn post(&self, url: &str, action: &str) -> Result<()> {
        let response = self
            .http
            .post(url)
            .header(self.header.as_str(), self.credential.as_str())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!(action, "admin action accepted");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => {
                warn!(action, "admin credential rejected");
                Err(LiveError::InvalidCredential)
            }
            status => {
                warn!(action, status = status.as_u16(), "admin action failed");
                Err(LiveError::HttpStatus {
                    status: status.as_u16(),
                })
            }
        }
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("pause_url", &self.pause_url)
            .field("resume_url", &self.resume_url)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
