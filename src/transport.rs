//! Stream endpoint seams.
//!
//! The connection task never opens sockets itself: it asks a [`Connector`]
//! for a fresh [`Transport`] on every attempt, reconnects included, and drops
//! the transport once the session ends. Tests plug in scripted connectors;
//! [`LiveClient::connect`](crate::LiveClient::connect) uses the WebSocket one.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use tournament_live::error::LiveError;
//! use tournament_live::transport::Connector;
//! use tournament_live::WebSocketTransport;
//!
//! /// Dials whichever replica the load balancer hands out.
//! struct ReplicaConnector {
//!     replicas: Vec<String>,
//!     next: std::sync::atomic::AtomicUsize,
//! }
//!
//! #[async_trait]
//! impl Connector for ReplicaConnector {
//!     type Transport = WebSocketTransport;
//!
//!     async fn connect(&self) -> Result<WebSocketTransport, LiveError> {
//!         let i = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         WebSocketTransport::connect(&self.replicas[i % self.replicas.len()]).await
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::LiveError;

/// One open text-frame connection.
///
/// `recv` is raced against the keepalive timer and must be cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// # Errors
    ///
    /// [`LiveError::TransportClosed`] after `close`, otherwise
    /// [`LiveError::TransportSend`].
    async fn send(&mut self, frame: String) -> Result<(), LiveError>;

    /// `None` ends the session; an error ends it with that reason.
    async fn recv(&mut self) -> Option<Result<String, LiveError>>;

    async fn close(&mut self) -> Result<(), LiveError>;
}

/// Opens one [`Transport`] per connection attempt.
///
/// Called again after every close and every failed attempt, once the
/// reconnect delay has elapsed. There is no retry limit, so an error here
/// only costs one delay.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// # Errors
    ///
    /// Any error counts as a failed attempt and is reported as
    /// [`LiveEvent::Disconnected`](crate::LiveEvent::Disconnected).
    async fn connect(&self) -> Result<Self::Transport, LiveError>;
}
