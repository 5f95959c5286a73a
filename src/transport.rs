//! Transport abstraction for the push channel.
//!
//! The [`Transport`] trait is a bidirectional text message channel between the
//! dashboard and the backend. Every message is one complete JSON frame, so
//! implementations handle framing internally (WebSocket frames, SSE lines,
//! an in-process channel in tests).
//!
//! # Connection Setup
//!
//! Reconnection is owned by the
//! [`ConnectionManager`](crate::connection::ConnectionManager), so it needs to
//! open a fresh transport for every attempt. That is what [`Connector`] is
//! for: it captures the endpoint (URL, headers, TLS) once and hands out a new
//! connected [`Transport`] on each call.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use bingo_dashboard_client::error::DashboardError;
//! use bingo_dashboard_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), DashboardError> {
//!         // Send the JSON text frame
//! #       let _ = message;
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, DashboardError>> {
//!         // Return None when the connection is closed cleanly
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), DashboardError> {
//!         Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self) -> Result<Box<dyn Transport>, DashboardError> {
//!         Ok(Box::new(MyTransport {}))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::DashboardError;

/// A bidirectional text message transport for the push channel.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data. Channel-based implementations (e.g., wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), DashboardError>;

    /// Receive the next JSON text message from the backend.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred (e.g., [`DashboardError::TransportReceive`])
    /// - `None`: the connection was closed cleanly by the backend
    async fn recv(&mut self) -> Option<Result<String, DashboardError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), DashboardError>;
}

/// Opens push-channel transports.
///
/// Called once per connection attempt; the caller applies the handshake
/// timeout around each call.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connected transport.
    ///
    /// # Errors
    ///
    /// Any error is reported as a `connect_error` and counts against the
    /// retry budget.
    async fn connect(&self) -> Result<Box<dyn Transport>, DashboardError>;
}
