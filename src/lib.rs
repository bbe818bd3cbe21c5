//! # Tournament Live
//!
//! Live-state synchronization client for automated tournament spectator
//! dashboards.
//!
//! The server pushes JSON frames over a long-lived stream. This crate keeps
//! the connection up (fixed-delay reconnect, periodic keepalive), applies every
//! frame to a tournament state machine, and reconstructs absolute per-team
//! score trajectories from the match-relative deltas the server reports.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in** — default `transport-websocket` feature provides [`WebSocketConnector`]
//! - **Observable state** — tournament state and score timeseries via `watch` receivers
//! - **Event-driven** — connection lifecycle and presentation cues as [`LiveEvent`]s
//! - **Snapshot and admin endpoints** — default `http` feature provides
//!   [`SnapshotLoader`] and [`AdminClient`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "transport-websocket", feature = "http"))]
//! # async fn example() -> Result<(), tournament_live::LiveError> {
//! use tournament_live::{LiveClient, LiveConfig, LiveEvent, SnapshotLoader};
//!
//! let config = LiveConfig::new("http://localhost:8000/api");
//! let (mut client, mut events) = LiveClient::connect(config.clone())?;
//! let _ = client.load_snapshot(&SnapshotLoader::new(&config)?).await;
//!
//! while let Some(event) = events.recv().await {
//!     if let LiveEvent::MatchEndCue { leaderboard, .. } = event {
//!         println!("leader: {:?}", leaderboard.first());
//!     }
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "http")]
pub mod admin;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod protocol;
#[cfg(feature = "http")]
pub mod snapshot;
pub mod store;
pub mod timeseries;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "http")]
pub use admin::AdminClient;
pub use client::LiveClient;
pub use config::LiveConfig;
pub use connection::ConnectionState;
pub use dispatch::{MessageDispatcher, NoHooks, PresentationHooks};
pub use error::LiveError;
pub use event::LiveEvent;
pub use protocol::{ServerMessage, Snapshot};
#[cfg(feature = "http")]
pub use snapshot::SnapshotLoader;
pub use store::{TournamentState, TournamentStateStore};
pub use timeseries::{ScorePoint, ScoreTimeseries, ScoreTimeseriesAccumulator};
pub use transport::{Connector, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
