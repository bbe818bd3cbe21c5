//! Error types for the tournament live client.

use thiserror::Error;

/// Errors that can occur when using the tournament live client.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to decode an inbound frame or HTTP body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The background connection task is no longer running.
    #[error("live client is not running")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The configured base URL cannot be turned into an endpoint URL.
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An HTTP request could not be completed.
    #[error("http request failed: {0}")]
    Http(String),

    /// The server answered an HTTP request with a non-success status.
    #[error("server responded with status {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The admin credential was rejected by the server.
    #[error("invalid admin credential")]
    InvalidCredential,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LiveError {
    /// Message suitable for showing to the person who triggered an admin action.
    ///
    /// A rejected credential gets its own wording so it can be told apart from
    /// every other failure of the same action.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "Invalid admin credential",
            _ => "The action failed, please try again",
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for LiveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::HttpStatus {
                status: status.as_u16(),
            };
        }
        Self::Http(err.to_string())
    }
}

/// A specialized [`Result`] type for tournament live client operations.
pub type Result<T> = std::result::Result<T, LiveError>;
