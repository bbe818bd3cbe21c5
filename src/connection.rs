//! Connection lifecycle: connect, keepalive, reconnect, teardown.
//!
//! [`ConnectionManager`] runs as one background task. It dials through a
//! [`Connector`], feeds every inbound frame to the [`MessageDispatcher`], sends
//! the keepalive literal on a fixed interval while open, and after any close or
//! failed attempt waits a fixed delay before dialing again. There is no retry
//! limit and the delay never grows. Commands from the client handle (snapshot
//! seeding) are served in every phase, including while disconnected.
//!
//! The task stops only when shutdown is requested; pending timers are dropped
//! with it and an open transport is closed first.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::KEEPALIVE_PAYLOAD;
use crate::dispatch::MessageDispatcher;
use crate::event::{emit_event, LiveEvent};
use crate::protocol::Snapshot;
use crate::transport::{Connector, Transport};

/// State of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    #[default]
    Connecting,
    /// Frames are flowing.
    Open,
    /// Waiting for the reconnect delay, or stopped.
    Closed,
}

/// Requests from the client handle to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Seed(Snapshot),
}

/// How a session ended.
enum SessionEnd {
    Closed(Option<String>),
    Shutdown,
}

/// Everything the task serves regardless of connection phase.
struct Control {
    dispatcher: MessageDispatcher,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl Control {
    /// Drive `fut` to completion while serving commands.
    ///
    /// Returns `None` if shutdown was requested first.
    async fn race<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown_rx => return None,
                Some(cmd) = self.cmd_rx.recv() => self.handle_command(cmd),
                out = &mut fut => return Some(out),
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Seed(snapshot) => self.dispatcher.seed(snapshot),
        }
    }
}

pub(crate) struct ConnectionManager<C: Connector> {
    connector: C,
    control: Control,
    event_tx: mpsc::Sender<LiveEvent>,
    state_tx: watch::Sender<ConnectionState>,
    reconnect_delay: Duration,
    keepalive_interval: Duration,
}

impl<C: Connector> ConnectionManager<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        connector: C,
        dispatcher: MessageDispatcher,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        shutdown_rx: oneshot::Receiver<()>,
        event_tx: mpsc::Sender<LiveEvent>,
        state_tx: watch::Sender<ConnectionState>,
        reconnect_delay: Duration,
        keepalive_interval: Duration,
    ) -> Self {
        Self {
            connector,
            control: Control {
                dispatcher,
                cmd_rx,
                shutdown_rx,
            },
            event_tx,
            state_tx,
            reconnect_delay,
            keepalive_interval,
        }
    }

    /// Run until shutdown.
    pub(crate) async fn run(mut self) {
        debug!("connection loop started");
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            debug!(attempt, "connecting to live stream");

            let connect = self.connector.connect();
            let Some(result) = self.control.race(connect).await else {
                break;
            };

            match result {
                Ok(transport) => {
                    self.set_state(ConnectionState::Open);
                    info!(attempt, "live stream open");
                    emit_event(&self.event_tx, LiveEvent::Connected);

                    let reason = match self.run_session(transport).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed(reason) => reason,
                    };
                    self.set_state(ConnectionState::Closed);
                    info!(reason = reason.as_deref().unwrap_or("closed"), "live stream closed");
                    // Never awaited: an undrained receiver must not stall reconnection.
                    emit_event(&self.event_tx, LiveEvent::Disconnected { reason });
                }
                Err(e) => {
                    self.set_state(ConnectionState::Closed);
                    warn!(attempt, "connection attempt failed: {e}");
                    emit_event(
                        &self.event_tx,
                        LiveEvent::Disconnected {
                            reason: Some(e.to_string()),
                        },
                    );
                }
            }

            debug!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "scheduling reconnect"
            );
            emit_event(
                &self.event_tx,
                LiveEvent::ReconnectScheduled {
                    delay: self.reconnect_delay,
                },
            );
            let wait = tokio::time::sleep(self.reconnect_delay);
            if self.control.race(wait).await.is_none() {
                break;
            }
        }

        self.set_state(ConnectionState::Closed);
        debug!("connection loop exited");
    }

    /// Pump one open connection until it closes or shutdown is requested.
    async fn run_session(&mut self, mut transport: C::Transport) -> SessionEnd {
        let period = self.keepalive_interval;
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.control.shutdown_rx => {
                    debug!("shutdown signal received, closing live stream");
                    if let Err(e) = transport.close().await {
                        debug!("error while closing transport: {e}");
                    }
                    self.set_state(ConnectionState::Closed);
                    emit_event(
                        &self.event_tx,
                        LiveEvent::Disconnected {
                            reason: Some("client shut down".into()),
                        },
                    );
                    return SessionEnd::Shutdown;
                }

                Some(cmd) = self.control.cmd_rx.recv() => {
                    self.control.handle_command(cmd);
                }

                _ = keepalive.tick() => {
                    send_keepalive(&self.state_tx, &mut transport).await;
                }

                incoming = transport.recv() => {
                    match incoming {
                        Some(Ok(text)) => {
                            self.control.dispatcher.handle_frame(&text);
                        }
                        Some(Err(e)) => {
                            error!("transport receive error: {e}");
                            return SessionEnd::Closed(Some(e.to_string()));
                        }
                        None => {
                            debug!("transport closed by server");
                            return SessionEnd::Closed(None);
                        }
                    }
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "connection state changed");
        }
    }
}

/// Send the keepalive literal if the connection is open; skip silently
/// otherwise. A failed send is only logged: the receive side reports the
/// close.
async fn send_keepalive<T: Transport>(
    state_tx: &watch::Sender<ConnectionState>,
    transport: &mut T,
) {
    if *state_tx.borrow() != ConnectionState::Open {
        debug!("keepalive skipped, connection not open");
        return;
    }
    if let Err(e) = transport.send(KEEPALIVE_PAYLOAD.to_string()).await {
        warn!("keepalive send failed: {e}");
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::LiveConfig;
    use crate::dispatch::NoHooks;
    use crate::error::LiveError;
    use std::sync::{Arc, Mutex};

    /// Connector whose every attempt fails.
    #[derive(Debug, Clone, Copy, Default)]
    struct OfflineConnector;

    #[derive(Debug)]
    enum NoTransport {}

    #[async_trait::async_trait]
    impl Transport for NoTransport {
        async fn send(&mut self, _frame: String) -> Result<(), LiveError> {
            match *self {}
        }

        async fn recv(&mut self) -> Option<Result<String, LiveError>> {
            match *self {}
        }

        async fn close(&mut self) -> Result<(), LiveError> {
            match *self {}
        }
    }

    #[async_trait::async_trait]
    impl Connector for OfflineConnector {
        type Transport = NoTransport;

        async fn connect(&self) -> Result<NoTransport, LiveError> {
            Err(LiveError::NotConnected)
        }
    }

    /// Transport that records sent frames and never yields anything.
    struct SilentTransport {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Transport for SilentTransport {
        async fn send(&mut self, frame: String) -> Result<(), LiveError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, LiveError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), LiveError> {
            Ok(())
        }
    }

    fn manager(
        state: ConnectionState,
    ) -> (
        ConnectionManager<OfflineConnector>,
        mpsc::UnboundedSender<Command>,
        oneshot::Sender<()>,
    ) {
        let config = LiveConfig::new("http://localhost/api");
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (event_tx, _event_rx) = mpsc::channel(8);
        let (state_tx, _state_rx) = watch::channel(state);
        let mgr = ConnectionManager::new(
            OfflineConnector,
            MessageDispatcher::new(&config, Box::new(NoHooks)),
            cmd_rx,
            shutdown_rx,
            event_tx,
            state_tx,
            config.reconnect_delay,
            config.keepalive_interval,
        );
        (mgr, cmd_tx, shutdown_tx)
    }

    #[tokio::test]
    async fn keepalive_is_skipped_unless_open() {
        for (state, expected) in [
            (ConnectionState::Connecting, 0),
            (ConnectionState::Closed, 0),
            (ConnectionState::Open, 1),
        ] {
            let (mgr, _cmd, _shutdown) = manager(state);
            let sent = Arc::new(Mutex::new(Vec::new()));
            let mut transport = SilentTransport {
                sent: Arc::clone(&sent),
            };
            send_keepalive(&mgr.state_tx, &mut transport).await;
            assert_eq!(sent.lock().unwrap().len(), expected, "{state:?}");
        }
    }

    #[tokio::test]
    async fn race_serves_commands_until_future_completes() {
        let (mut mgr, cmd_tx, _shutdown) = manager(ConnectionState::Closed);
        cmd_tx
            .send(Command::Seed(Snapshot {
                tournament: None,
                leaderboard: vec![crate::protocol::Team::new("A", "Alpha", 4)],
            }))
            .unwrap();

        let out = mgr
            .control
            .race(async {
                tokio::task::yield_now().await;
                7
            })
            .await;
        assert_eq!(out, Some(7));
        assert_eq!(mgr.control.dispatcher.store().snapshot().leaderboard.len(), 1);
    }

    #[tokio::test]
    async fn race_returns_none_on_shutdown() {
        let (mut mgr, _cmd, shutdown_tx) = manager(ConnectionState::Closed);
        shutdown_tx.send(()).unwrap();
        let out = mgr.control.race(std::future::pending::<()>()).await;
        assert!(out.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn offline_connector_keeps_retrying_on_fixed_delay() {
        let (mgr, _cmd, shutdown_tx) = manager(ConnectionState::Closed);
        let state_rx = mgr.state_tx.subscribe();
        let task = tokio::spawn(mgr.run());

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(*state_rx.borrow(), ConnectionState::Closed);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(*state_rx.borrow(), ConnectionState::Closed);
    }
}
