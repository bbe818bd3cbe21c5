#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for tournament live integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`MockConnector`] that hands out
//! one scripted transport per connection attempt, and helpers for building
//! server frame JSON.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tournament_live::{Connector, LiveError, Transport};

/// One scripted inbound item: a frame, a receive error, or `None` for a
/// server-side close.
pub type Inbound = Option<Result<String, LiveError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted mock transport.
///
/// Scripted items are consumed in order by `recv()`; once the script runs out
/// the transport hangs until the client closes it. Sent frames and closes are
/// recorded on the shared [`Recorder`].
pub struct MockTransport {
    incoming: VecDeque<Inbound>,
    recorder: Recorder,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), LiveError> {
        self.recorder.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, LiveError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        self.recorder.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// Outcome of one scripted connection attempt.
pub enum Attempt {
    /// The handshake fails.
    Fail,
    /// The handshake succeeds and the transport replays these items.
    Open(Vec<Inbound>),
}

/// Shared handles for inspecting what the client did.
#[derive(Clone, Default)]
pub struct Recorder {
    /// Every frame the client sent, across all connections.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Number of transports the client closed.
    pub closes: Arc<AtomicUsize>,
    /// When each connection attempt started.
    pub attempts: Arc<StdMutex<Vec<Instant>>>,
}

impl Recorder {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

/// Connector that replays scripted attempts in order. Once the script runs
/// out every further attempt fails.
pub struct MockConnector {
    attempts: StdMutex<VecDeque<Attempt>>,
    recorder: Recorder,
}

impl MockConnector {
    pub fn new(attempts: Vec<Attempt>) -> (Self, Recorder) {
        let recorder = Recorder::default();
        let connector = Self {
            attempts: StdMutex::new(VecDeque::from(attempts)),
            recorder: recorder.clone(),
        };
        (connector, recorder)
    }

    /// A connector whose first attempt opens a transport replaying `frames`,
    /// which then stays open.
    pub fn single(frames: Vec<String>) -> (Self, Recorder) {
        Self::new(vec![Attempt::Open(
            frames.into_iter().map(|f| Some(Ok(f))).collect(),
        )])
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, LiveError> {
        self.recorder.attempts.lock().unwrap().push(Instant::now());
        let next = self.attempts.lock().unwrap().pop_front();
        match next {
            Some(Attempt::Open(incoming)) => Ok(MockTransport {
                incoming: VecDeque::from(incoming),
                recorder: self.recorder.clone(),
            }),
            Some(Attempt::Fail) | None => {
                Err(LiveError::TransportReceive("connection refused".into()))
            }
        }
    }
}

// ── JSON helper functions ───────────────────────────────────────────

fn teams_json(teams: &[(&str, i64)]) -> serde_json::Value {
    teams
        .iter()
        .map(|(id, score)| json!({"id": id, "name": format!("Team {id}"), "total_score": score}))
        .collect()
}

/// Frame for a tag that carries no payload.
pub fn tag_json(tag: &str) -> String {
    json!({"type": tag}).to_string()
}

pub fn initial_state_json(status: &str, teams: &[(&str, i64)]) -> String {
    json!({
        "type": "initial_state",
        "tournament": {"status": status},
        "leaderboard": teams_json(teams),
    })
    .to_string()
}

/// `match_started` using the fixed team slots.
pub fn match_started_json(match_number: u32, team_a: &str, team_b: &str) -> String {
    json!({
        "type": "match_started",
        "data": {
            "match_number": match_number,
            "team_a": {"id": team_a, "name": format!("Team {team_a}")},
            "team_b": {"id": team_b, "name": format!("Team {team_b}")},
        },
    })
    .to_string()
}

/// `match_progress` using a `participants` array; every team cooperated.
pub fn match_progress_json(round: u32, total_rounds: u32, deltas: &[(&str, i64)]) -> String {
    let participants: Vec<_> = deltas
        .iter()
        .map(|(id, score)| json!({"id": id, "score": score, "last_move": "cooperate"}))
        .collect();
    json!({
        "type": "match_progress",
        "data": {
            "round": round,
            "total_rounds": total_rounds,
            "participants": participants,
        },
    })
    .to_string()
}

pub fn match_completed_json(teams: &[(&str, i64)]) -> String {
    json!({"type": "match_completed", "leaderboard": teams_json(teams)}).to_string()
}

pub fn tournament_finished_json(teams: &[(&str, i64)]) -> String {
    json!({"type": "tournament_finished", "leaderboard": teams_json(teams)}).to_string()
}
