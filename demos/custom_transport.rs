//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] and [`Connector`] traits with a
//! simple in-process loopback channel, then plays a short match through it.
//! This is useful for:
//!
//! - **Testing** — exercise your dashboard rendering without a real server
//! - **Custom backends** — adapt any I/O layer (SSE, TCP, a recorded replay)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tournament_live::{Connector, LiveClient, LiveConfig, LiveError, LiveEvent, Transport};

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback: implements [`Transport`].
pub struct LoopbackTransport {
    /// Frames the client sends go here (the server reads the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Frames the server pushes arrive here.
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half of the loopback, used to drive the conversation.
pub struct LoopbackServer {
    /// Read what the client sent (keepalives).
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Push frames to the client as if they came from the server.
    pub tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };

    (transport, server)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement Transport and Connector
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, frame: String) -> Result<(), LiveError> {
        self.tx
            .send(frame)
            .map_err(|e| LiveError::TransportSend(e.to_string()))
    }

    /// Returns `None` once the server half is dropped; that is how the client
    /// discovers the connection has ended.
    ///
    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, LiveError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        Ok(())
    }
}

/// Hands out the loopback transport once. Every later attempt fails, so the
/// client keeps retrying on its fixed delay until shut down.
struct LoopbackConnector {
    transport: Mutex<Option<LoopbackTransport>>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, LiveError> {
        self.transport
            .lock()
            .map_err(|_| LiveError::NotConnected)?
            .take()
            .ok_or(LiveError::TransportClosed)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, server) = loopback_pair();
    let connector = LoopbackConnector {
        transport: Mutex::new(Some(transport)),
    };

    let config = LiveConfig::new("http://loopback.invalid/api");
    let (mut client, mut event_rx) = LiveClient::start(connector, config);

    // ── Fake server: play one short match ───────────────────────────
    let frames = [
        serde_json::json!({
            "type": "initial_state",
            "tournament": {"status": "idle"},
            "leaderboard": [
                {"id": "tft", "name": "Tit for Tat", "total_score": 0},
                {"id": "grd", "name": "Grudger", "total_score": 0}
            ]
        }),
        serde_json::json!({"type": "tournament_started"}),
        serde_json::json!({
            "type": "match_started",
            "data": {"match_number": 1, "team_a": {"id": "tft"}, "team_b": {"id": "grd"}}
        }),
        serde_json::json!({
            "type": "match_progress",
            "data": {"round": 1, "total_rounds": 2,
                     "team_a": {"id": "tft", "score": 3, "last_move": "C"},
                     "team_b": {"id": "grd", "score": 3, "last_move": "C"}}
        }),
        serde_json::json!({
            "type": "match_progress",
            "data": {"round": 2, "total_rounds": 2,
                     "team_a": {"id": "tft", "score": 3, "last_move": "C"},
                     "team_b": {"id": "grd", "score": 8, "last_move": "D"}}
        }),
        serde_json::json!({
            "type": "match_completed",
            "leaderboard": [
                {"id": "grd", "name": "Grudger", "total_score": 8},
                {"id": "tft", "name": "Tit for Tat", "total_score": 3}
            ]
        }),
    ];
    for frame in frames {
        server.tx.send(frame.to_string())?;
    }

    // ── Read events until the match end cue ─────────────────────────
    while let Some(event) = event_rx.recv().await {
        match event {
            LiveEvent::Connected => tracing::info!("Event: Connected"),
            LiveEvent::Intro => tracing::info!("Event: Intro"),
            LiveEvent::Notification { message } => tracing::info!("Event: {message}"),
            LiveEvent::MatchStartCue { current_match, after } => {
                tracing::info!(
                    "Event: match {} starting (cue in {after:?})",
                    current_match.match_number
                );
            }
            LiveEvent::MatchEndCue { leaderboard, after } => {
                tracing::info!("Event: match over (cue in {after:?})");
                for (rank, team) in leaderboard.iter().enumerate() {
                    tracing::info!("  #{} {} — {}", rank + 1, team.name, team.total_score);
                }
                break;
            }
            other => tracing::info!("Event: {other:?}"),
        }
    }

    for point in client.timeseries() {
        tracing::info!("tick {}: {:?}", point.tick, point.scores);
    }

    // Dropping the server half closes the stream; the client would now keep
    // retrying every 3 seconds, so shut it down.
    drop(server);
    client.shutdown().await;
    tracing::info!("Client shut down cleanly");

    Ok(())
}
