//! Events emitted by the live client to the embedding application.
//!
//! State itself is observed through the `watch` receivers on
//! [`LiveClient`](crate::client::LiveClient); events cover the connection
//! lifecycle and the one-off presentation cues a renderer plays.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{Match, Team};

/// Something the renderer may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// The stream connection opened.
    Connected,
    /// The stream connection closed or a connection attempt failed.
    Disconnected {
        /// Transport error text, `None` for a clean close.
        reason: Option<String>,
    },
    /// The next connection attempt will start after `delay`.
    ReconnectScheduled { delay: Duration },
    /// A new tournament started: play the intro.
    Intro,
    /// A match started: play the match start visual after `after`.
    MatchStartCue { current_match: Match, after: Duration },
    /// A match ended: play the match end visual after `after`.
    MatchEndCue { leaderboard: Vec<Team>, after: Duration },
    /// Short success message for a toast or banner.
    Notification { message: String },
}

/// Emit an event without waiting. If the channel is full the event is dropped
/// with a warning so the connection task never blocks on a slow consumer.
pub(crate) fn emit_event(event_tx: &mpsc::Sender<LiveEvent>, event: LiveEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}
