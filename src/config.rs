//! Client configuration.

use std::time::Duration;

use crate::error::{LiveError, Result};

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Interval between keepalive frames while the connection is open.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(25_000);

/// Literal sent as the keepalive frame. Deliberately not JSON.
pub const KEEPALIVE_PAYLOAD: &str = "ping";

/// Maximum number of points kept in the score timeseries.
pub const DEFAULT_TIMESERIES_WINDOW: usize = 100;

const DEFAULT_MATCH_START_CUE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MATCH_END_CUE_DELAY: Duration = Duration::from_millis(2000);
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ADMIN_HEADER: &str = "X-Admin-Key";

/// Configuration for a [`LiveClient`](crate::client::LiveClient) and its
/// HTTP collaborators.
///
/// The only required field is the service base URL (for example
/// `http://localhost:8000/api`). The stream endpoint and REST endpoints are
/// derived from it.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tournament_live::LiveConfig;
///
/// let config = LiveConfig::new("https://arena.example.com/api")
///     .with_reconnect_delay(Duration::from_secs(5))
///     .with_timeseries_window(50);
///
/// assert_eq!(config.ws_url().unwrap(), "wss://arena.example.com/api/ws");
/// assert_eq!(config.timeseries_window, 50);
/// ```
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Base URL of the tournament service, `http` or `https`.
    pub base_url: String,
    /// Delay before reconnecting after a close. Never grows.
    ///
    /// Defaults to **3000 ms**.
    pub reconnect_delay: Duration,
    /// Interval between keepalive frames while open.
    ///
    /// Defaults to **25000 ms**.
    pub keepalive_interval: Duration,
    /// Sliding window size of the score timeseries.
    ///
    /// Defaults to **100**. Values below 1 are clamped to 1.
    pub timeseries_window: usize,
    /// Delay the renderer should wait before playing the match start cue.
    pub match_start_cue_delay: Duration,
    /// Delay the renderer should wait before playing the match end cue.
    pub match_end_cue_delay: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the background task gets to close the connection on shutdown
    /// before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Time allowed for one connection handshake or HTTP request.
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Header carrying the admin credential on pause/resume requests.
    pub admin_header: String,
}

impl LiveConfig {
    /// Create a configuration for the given service base URL with default values.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            timeseries_window: DEFAULT_TIMESERIES_WINDOW,
            match_start_cue_delay: DEFAULT_MATCH_START_CUE_DELAY,
            match_end_cue_delay: DEFAULT_MATCH_END_CUE_DELAY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            admin_header: DEFAULT_ADMIN_HEADER.to_string(),
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the keepalive interval. A zero interval is bumped to 1 ms.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn with_timeseries_window(mut self, window: usize) -> Self {
        self.timeseries_window = window.max(1);
        self
    }

    #[must_use]
    pub fn with_cue_delays(mut self, match_start: Duration, match_end: Duration) -> Self {
        self.match_start_cue_delay = match_start;
        self.match_end_cue_delay = match_end;
        self
    }

    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_admin_header(mut self, header: impl Into<String>) -> Self {
        self.admin_header = header.into();
        self
    }

    /// URL of the live stream endpoint: the base URL with `http` mapped to
    /// `ws`, `https` mapped to `wss`, and `/ws` appended.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::InvalidUrl`] if the base URL has no scheme, an
    /// unsupported scheme, or no host.
    pub fn ws_url(&self) -> Result<String> {
        let (scheme, rest) = self.split_base()?;
        let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(self.invalid(format!("unsupported scheme `{other}`")));
            }
        };
        Ok(format!("{ws_scheme}://{rest}/ws"))
    }

    /// URL of a REST endpoint under the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::InvalidUrl`] if the base URL is malformed.
    pub fn http_url(&self, path: &str) -> Result<String> {
        let (scheme, rest) = self.split_base()?;
        Ok(format!("{scheme}://{rest}/{}", path.trim_start_matches('/')))
    }

    fn split_base(&self) -> Result<(&str, &str)> {
        let base = self.base_url.trim().trim_end_matches('/');
        let (scheme, rest) = base
            .split_once("://")
            .ok_or_else(|| self.invalid("missing scheme".to_string()))?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(self.invalid("missing host".to_string()));
        }
        Ok((scheme, rest))
    }

    fn invalid(&self, reason: String) -> LiveError {
        LiveError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LiveConfig::new("http://localhost:8000/api");
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(config.keepalive_interval, Duration::from_millis(25_000));
        assert_eq!(config.timeseries_window, 100);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.admin_header, "X-Admin-Key");
    }

    #[test]
    fn clamps_window_and_capacity() {
        let config = LiveConfig::new("http://h")
            .with_timeseries_window(0)
            .with_event_channel_capacity(0)
            .with_keepalive_interval(Duration::ZERO);
        assert_eq!(config.timeseries_window, 1);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.keepalive_interval, Duration::from_millis(1));
    }

    #[test]
    fn ws_url_maps_schemes() {
        assert_eq!(
            LiveConfig::new("http://localhost:8000/api/").ws_url().unwrap(),
            "ws://localhost:8000/api/ws"
        );
        assert_eq!(
            LiveConfig::new("HTTPS://arena.example.com").ws_url().unwrap(),
            "wss://arena.example.com/ws"
        );
    }

    #[test]
    fn ws_url_rejects_bad_bases() {
        for base in ["localhost:8000", "ftp://host", "http://", "http:///api"] {
            let err = LiveConfig::new(base).ws_url().unwrap_err();
            assert!(matches!(err, LiveError::InvalidUrl { .. }), "{base}");
        }
    }

    #[test]
    fn http_url_joins_paths() {
        let config = LiveConfig::new("http://localhost:8000/api/");
        assert_eq!(
            config.http_url("/tournament/status").unwrap(),
            "http://localhost:8000/api/tournament/status"
        );
        assert_eq!(
            config.http_url("leaderboard").unwrap(),
            "http://localhost:8000/api/leaderboard"
        );
    }
}
