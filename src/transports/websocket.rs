//! WebSocket push channel using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the dashboard's JSON event frames over a
//! WebSocket; [`WebSocketConnector`] opens a new one for each connection
//! attempt. Both `ws://` and `wss://` URLs are accepted; TLS support depends on
//! the `tokio-tungstenite` features enabled by the final binary.
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), bingo_dashboard_client::DashboardError> {
//! use bingo_dashboard_client::{Transport, WebSocketTransport};
//!
//! let mut transport = WebSocketTransport::connect("ws://localhost:5000/events").await?;
//! transport.send(r#"{"event":"request_game_state"}"#.to_string()).await?;
//!
//! if let Some(Ok(msg)) = transport.recv().await {
//!     println!("received: {msg}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::DashboardError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not consume or lose a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Io`] if the URL is invalid or the connection
    /// cannot be established. The [`ErrorKind`](std::io::ErrorKind) of an
    /// underlying I/O error is preserved.
    pub async fn connect(url: &str) -> Result<Self, DashboardError> {
        tracing::debug!(url = %url, "connecting push channel");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            DashboardError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "push channel established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established WebSocket stream (custom TLS, proxies,
    /// extra headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), DashboardError> {
        if self.closed {
            return Err(DashboardError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| DashboardError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, DashboardError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(DashboardError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong reply itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary frame on push channel, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), DashboardError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| DashboardError::TransportSend(e.to_string()))
    }
}

/// Opens a [`WebSocketTransport`] to a fixed URL for every connection attempt.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The endpoint this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DashboardError> {
        let transport = WebSocketTransport::connect(&self.url).await?;
        Ok(Box::new(transport))
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
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::WebSocketStream;

    const NEW_TRACK: &str =
        r#"{"event":"new_track","data":{"track":{"artist":"ABBA","name":"Waterloo"}}}"#;

    #[test]
    fn websocket_transport_is_send_and_debug() {
        fn assert_send_debug<T: Send + std::fmt::Debug>() {}
        assert_send_debug::<WebSocketTransport>();
        assert_send_debug::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, DashboardError::Io(_)));
    }

    // ── Local server helpers ─────────────────────────────────────────────

    /// Accept up to `connections` WebSocket clients, running `handler` on
    /// each in its own task, and return the URL to dial.
    async fn start_mock_server<F, Fut>(connections: usize, handler: F) -> String
    where
        F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for _ in 0..connections {
                let (tcp, _) = listener.accept().await.unwrap();
                let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                tokio::spawn(handler(ws));
            }
        });

        format!("ws://{addr}/events")
    }

    async fn drain(mut ws: WebSocketStream<TcpStream>) {
        while let Some(Ok(_)) = ws.next().await {}
    }

    // ── Transport ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn recv_yields_text_frames_in_order() {
        let url = start_mock_server(1, |mut ws| async move {
            ws.send(Message::Text(NEW_TRACK.into())).await.unwrap();
            let status = r#"{"event":"connection_status","data":{"status":"connected"}}"#;
            ws.send(Message::Text(status.into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();

        assert_eq!(transport.recv().await.unwrap().unwrap(), NEW_TRACK);
        let second = transport.recv().await.unwrap().unwrap();
        assert!(second.contains("connection_status"));
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(1, |mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into())).await.unwrap();
            ws.send(Message::Text(NEW_TRACK.into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), NEW_TRACK);
    }

    #[tokio::test]
    async fn recv_returns_none_on_close_frame() {
        let url = start_mock_server(1, |mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_reaches_the_server() {
        let url = start_mock_server(1, |mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let request = r#"{"event":"request_game_state"}"#;
        transport.send(request.to_string()).await.unwrap();

        assert_eq!(transport.recv().await.unwrap().unwrap(), request);
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(1, drain).await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport
            .send(r#"{"event":"request_game_state"}"#.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::TransportClosed));
    }

    // ── Connector ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn connector_opens_a_fresh_transport_per_dial() {
        let url = start_mock_server(2, |mut ws| async move {
            ws.send(Message::Text(NEW_TRACK.into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;
        let connector = WebSocketConnector::new(url.clone());
        assert_eq!(connector.url(), url);

        let mut first = connector.connect().await.unwrap();
        assert_eq!(first.recv().await.unwrap().unwrap(), NEW_TRACK);
        assert!(first.recv().await.is_none());

        let mut second = connector.connect().await.unwrap();
        assert_eq!(second.recv().await.unwrap().unwrap(), NEW_TRACK);
        assert!(second.recv().await.is_none());
    }

    #[tokio::test]
    async fn connector_reports_refused_dial() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:1/events");
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, DashboardError::Io(_)));
    }
}
