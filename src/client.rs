//! Async client handle for the live tournament stream.
//!
//! [`LiveClient`] is a thin handle over a background connection task. The task
//! owns the dispatcher, and through it the state store and the score
//! timeseries. The handle observes them through `watch` receivers, sends
//! seeding commands over an unbounded channel, and gets lifecycle events and
//! presentation cues on a bounded channel returned from
//! [`LiveClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = LiveConfig::new("http://localhost:8000/api");
//! let (mut client, mut events) = LiveClient::connect(config.clone())?;
//! client.load_snapshot(&SnapshotLoader::new(&config)?).await.ok();
//!
//! let mut state = client.subscribe_state();
//! while state.changed().await.is_ok() {
//!     render(&state.borrow_and_update());
//! }
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::config::LiveConfig;
use crate::connection::{Command, ConnectionManager, ConnectionState};
use crate::dispatch::{ChannelHooks, MessageDispatcher};
use crate::error::{LiveError, Result};
use crate::event::LiveEvent;
use crate::protocol::Snapshot;
use crate::store::TournamentState;
use crate::timeseries::ScoreTimeseries;
use crate::transport::Connector;

/// Handle to a running live client.
///
/// Dropping the handle requests the same shutdown as
/// [`shutdown`](LiveClient::shutdown) without waiting for it: the task closes an
/// open connection and exits, and is aborted if it has not finished within
/// `shutdown_timeout`. Outside a tokio runtime the task is aborted at once.
pub struct LiveClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<TournamentState>,
    series_rx: watch::Receiver<ScoreTimeseries>,
    connection_rx: watch::Receiver<ConnectionState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl LiveClient {
    /// Spawn the connection task and return a handle plus event receiver.
    ///
    /// The task starts dialing through `connector` immediately and keeps
    /// reconnecting until shutdown. Must be called inside a tokio runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        connector: impl Connector,
        config: LiveConfig,
    ) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // tokio panics on a zero capacity.
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::Connecting);

        let dispatcher =
            MessageDispatcher::new(&config, Box::new(ChannelHooks::new(event_tx.clone())));
        let state_rx = dispatcher.store().subscribe();
        let series_rx = dispatcher.timeseries().subscribe();

        let manager = ConnectionManager::new(
            connector,
            dispatcher,
            cmd_rx,
            shutdown_rx,
            event_tx,
            connection_tx,
            config.reconnect_delay,
            config.keepalive_interval,
        );
        let task = tokio::spawn(manager.run());

        let client = Self {
            cmd_tx,
            state_rx,
            series_rx,
            connection_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    /// Start against the WebSocket endpoint derived from `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::InvalidUrl`] if the stream URL cannot be derived.
    #[cfg(feature = "transport-websocket")]
    pub fn connect(config: LiveConfig) -> Result<(Self, mpsc::Receiver<LiveEvent>)> {
        let connector = crate::transports::WebSocketConnector::new(config.ws_url()?)
            .with_connect_timeout(config.connect_timeout);
        Ok(Self::start(connector, config))
    }

    /// Seed state from a pulled snapshot, the same way `initial_state` does.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::NotConnected`] if the background task has stopped.
    pub fn seed(&self, snapshot: Snapshot) -> Result<()> {
        self.cmd_tx
            .send(Command::Seed(snapshot))
            .map_err(|_| LiveError::NotConnected)
    }

    /// Fetch a snapshot and seed from it.
    ///
    /// On failure the error is logged and returned; state is left untouched.
    ///
    /// # Errors
    ///
    /// Any error from [`SnapshotLoader::fetch`](crate::snapshot::SnapshotLoader::fetch)
    /// or [`seed`](Self::seed).
    #[cfg(feature = "http")]
    pub async fn load_snapshot(&self, loader: &crate::snapshot::SnapshotLoader) -> Result<()> {
        match loader.fetch().await {
            Ok(snapshot) => self.seed(snapshot),
            Err(e) => {
                warn!("snapshot fetch failed: {e}");
                Err(e)
            }
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Current tournament state.
    pub fn state(&self) -> TournamentState {
        self.state_rx.borrow().clone()
    }

    /// Current score timeseries, oldest point first.
    pub fn timeseries(&self) -> ScoreTimeseries {
        self.series_rx.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TournamentState> {
        self.state_rx.clone()
    }

    pub fn subscribe_timeseries(&self) -> watch::Receiver<ScoreTimeseries> {
        self.series_rx.clone()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection_rx.clone()
    }

    /// Returns `true` until [`shutdown`](Self::shutdown) has completed.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop reconnecting, close the connection if open, and wait for the
    /// background task to exit.
    ///
    /// The task gets `shutdown_timeout` to finish before it is aborted.
    pub async fn shutdown(&mut self) {
        debug!("LiveClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection task terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection task did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection task aborted: {join_err}");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for LiveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveClient")
            .field("connection", &self.connection_state())
            .field("status", &self.state_rx.borrow().tournament.status)
            .field("points", &self.series_rx.borrow().len())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for LiveClient {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let timeout = self.shutdown_timeout;
                handle.spawn(async move {
                    if tokio::time::timeout(timeout, &mut task).await.is_err() {
                        warn!("connection task did not exit after drop; aborting task");
                        task.abort();
                    }
                });
            }
            Err(_) => task.abort(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{Team, Tournament, TournamentStatus};
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Transport that replays scripted frames, then hangs.
    struct ScriptedTransport {
        incoming: VecDeque<String>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, _frame: String) -> Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            match self.incoming.pop_front() {
                Some(frame) => Some(Ok(frame)),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Hands out one scripted transport, then fails every attempt.
    struct OnceConnector {
        transport: StdMutex<Option<ScriptedTransport>>,
    }

    #[async_trait]
    impl Connector for OnceConnector {
        type Transport = ScriptedTransport;

        async fn connect(&self) -> Result<ScriptedTransport> {
            self.transport
                .lock()
                .unwrap()
                .take()
                .ok_or(LiveError::TransportClosed)
        }
    }

    fn start_with(frames: &[&str]) -> (LiveClient, mpsc::Receiver<LiveEvent>, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let connector = OnceConnector {
            transport: StdMutex::new(Some(ScriptedTransport {
                incoming: frames.iter().map(|f| (*f).to_string()).collect(),
                closed: Arc::clone(&closed),
            })),
        };
        let (client, events) = LiveClient::start(connector, LiveConfig::new("http://localhost/api"));
        (client, events, closed)
    }

    #[tokio::test]
    async fn connected_is_first_event_and_state_is_open() {
        let (mut client, mut events, _closed) = start_with(&[]);
        assert_eq!(events.recv().await.unwrap(), LiveEvent::Connected);
        assert_eq!(client.connection_state(), ConnectionState::Open);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn frames_update_observed_state() {
        let (mut client, mut events, _closed) = start_with(&[r#"{"type":"tournament_paused"}"#]);
        let mut state = client.subscribe_state();
        let _ = events.recv().await; // Connected
        state
            .wait_for(|s| s.tournament.status == TournamentStatus::Paused)
            .await
            .unwrap();
        assert_eq!(client.state().tournament.status, TournamentStatus::Paused);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn seed_applies_snapshot() {
        let (mut client, _events, _closed) = start_with(&[]);
        let mut state = client.subscribe_state();
        client
            .seed(Snapshot {
                tournament: Some(Tournament::new(TournamentStatus::Running)),
                leaderboard: vec![Team::new("A", "Alpha", 0), Team::new("B", "Beta", 0)],
            })
            .unwrap();
        state.wait_for(|s| s.leaderboard.len() == 2).await.unwrap();
        assert_eq!(client.state().tournament.status, TournamentStatus::Running);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_stops_task() {
        let (mut client, mut events, closed) = start_with(&[]);
        let _ = events.recv().await; // Connected
        assert!(client.is_running());
        client.shutdown().await;
        assert!(closed.load(Ordering::Relaxed));
        assert!(!client.is_running());
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        assert_eq!(
            events.recv().await.unwrap(),
            LiveEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
    }

    #[tokio::test]
    async fn seed_after_shutdown_is_not_connected() {
        let (mut client, _events, _closed) = start_with(&[]);
        client.shutdown().await;
        let err = client.seed(Snapshot::default()).unwrap_err();
        assert!(matches!(err, LiveError::NotConnected));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (mut client, _events, _closed) = start_with(&[]);
        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn drop_without_shutdown_closes_transport_and_stops_task() {
        let (client, mut events, closed) = start_with(&[]);
        let _ = events.recv().await; // Connected
        drop(client);
        assert_eq!(
            events.recv().await.unwrap(),
            LiveEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        // The task is gone, so every sender is dropped and the channel ends.
        while events.recv().await.is_some() {}
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn debug_impl_mentions_connection() {
        let (mut client, _events, _closed) = start_with(&[]);
        let debug = format!("{client:?}");
        assert!(debug.contains("LiveClient"));
        assert!(debug.contains("connection"));
        client.shutdown().await;
    }
}
