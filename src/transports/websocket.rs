//! WebSocket stream endpoint over `tokio-tungstenite`.
//!
//! [`WebSocketConnector`] is what [`LiveClient::connect`](crate::LiveClient::connect)
//! uses: every reconnect dials the same `/ws` URL under a handshake timeout
//! and yields a fresh [`WebSocketTransport`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_CONNECT_TIMEOUT;
use crate::error::LiveError;
use crate::transport::{Connector, Transport};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// One open stream connection. Built by [`WebSocketConnector`] or
/// [`WebSocketTransport::connect`].
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a connection without a handshake timeout.
    ///
    /// # Errors
    ///
    /// [`LiveError::Io`] if the URL is invalid or the handshake fails.
    pub async fn connect(url: &str) -> Result<Self, LiveError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(handshake_error)?;
        Ok(Self {
            stream,
            closed: false,
        })
    }
}

/// Handshake failures keep their I/O error kind so callers can tell a refused
/// connection from a TLS or protocol failure.
fn handshake_error(e: tokio_tungstenite::tungstenite::Error) -> LiveError {
    let kind = match &e {
        tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
        _ => std::io::ErrorKind::Other,
    };
    LiveError::Io(std::io::Error::new(kind, e))
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), LiveError> {
        if self.closed {
            return Err(LiveError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| LiveError::TransportSend(e.to_string()))
    }

    /// Only text frames are stream messages; everything else is skipped.
    async fn recv(&mut self) -> Option<Result<String, LiveError>> {
        while let Some(next) = self.stream.next().await {
            match next {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server closed the live stream");
                    return None;
                }
                Ok(Message::Binary(bytes)) => {
                    warn!(len = bytes.len(), "ignoring binary frame on live stream");
                }
                // tungstenite answers pings itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(LiveError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.stream
            .close(None)
            .await
            .map_err(|e| LiveError::TransportSend(e.to_string()))
    }
}

/// Dials the live stream endpoint once per connection attempt.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Handshake timeout per attempt. Defaults to **10 seconds**.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    /// # Errors
    ///
    /// [`LiveError::Timeout`] if the handshake outlives the connect timeout,
    /// otherwise whatever [`WebSocketTransport::connect`] returns.
    async fn connect(&self) -> Result<WebSocketTransport, LiveError> {
        debug!(url = %self.url, "dialing live stream");
        let transport = tokio::time::timeout(
            self.connect_timeout,
            WebSocketTransport::connect(&self.url),
        )
        .await
        .map_err(|_| LiveError::Timeout)??;
        info!(url = %self.url, "live stream handshake complete");
        Ok(transport)
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

    use tokio::net::TcpListener;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, LiveError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, LiveError::Io(_)));
    }

    /// Start a local WebSocket server that runs `handler` on the first
    /// accepted connection and return the URL to dial.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/api/ws")
    }

    #[tokio::test]
    async fn recv_receives_text_frames_then_none_on_close() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"type":"tournament_paused"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"type":"tournament_paused"}"#);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn keepalive_literal_reaches_server_as_text() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("ping".to_string()).await.unwrap();
        assert_eq!(seen_rx.await.unwrap(), "ping");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("ping".to_string()).await.unwrap_err();
        assert!(matches!(err, LiveError::TransportClosed));
    }

    #[tokio::test]
    async fn connector_times_out_on_unroutable_address() {
        let connector = WebSocketConnector::new("ws://192.0.2.1:1/api/ws")
            .with_connect_timeout(Duration::from_millis(50));
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, LiveError::Timeout | LiveError::Io(_)));
    }

    #[tokio::test]
    async fn connector_keeps_refused_error_kind() {
        let err = WebSocketConnector::new("ws://127.0.0.1:1/api/ws")
            .connect()
            .await
            .unwrap_err();
        match err {
            LiveError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connector_dials_its_url() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let connector = WebSocketConnector::new(url.clone());
        assert_eq!(connector.url(), url);
        let mut transport = connector.connect().await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "hello");
    }
}
