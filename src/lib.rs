//! # Bingo Dashboard Client
//!
//! Sync core of a live music-bingo dashboard.
//!
//! A backend streams game events (tracks played, card status changes) over a
//! push channel and serves the full state over HTTP. This crate keeps a local
//! view of that state correct while the push channel comes and goes, falls
//! back to polling when it is down, and validates bingo cards without ever
//! running two checks for the same card at once.
//!
//! ## Components
//!
//! - [`ConnectionManager`]: push-channel state machine with capped backoff
//! - [`FallbackScheduler`]: idempotent recurring refresh
//! - [`StateReconciler`]: maps each event to a local patch and a refresh
//! - [`ValidationOrchestrator`]: deduplicated, batch-isolated card checks
//! - [`DashboardSession`]: owns and wires all of the above
//!
//! ## Features
//!
//! - `transport-websocket` (default): [`WebSocketConnector`] over `tokio-tungstenite`
//! - `http-client` (default): [`HttpApi`](http::HttpApi) over `reqwest`
//! - `rustls-tls`: TLS for `https://` backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bingo_dashboard_client::{ChannelSink, DashboardConfig, DashboardSession, HttpApi, WebSocketConnector};
//!
//! let config = DashboardConfig::from_env();
//! let connector = Arc::new(WebSocketConnector::new(&config.channel_url));
//! let api = Arc::new(HttpApi::new(&config.base_url));
//! let (sink, mut notifications) = ChannelSink::new();
//!
//! let session = DashboardSession::new(config, connector, api, Arc::new(sink));
//! session.start().await;
//! ```

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
#[cfg(feature = "http-client")]
pub mod http;
pub mod model;
pub mod notify;
pub mod protocol;
pub mod reconciler;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod transport;
pub mod transports;
pub mod validation;

// Re-export primary types for ergonomic imports.
pub use api::DashboardApi;
pub use config::{ChannelConfig, DashboardConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{DashboardError, ErrorCategory};
pub use event::PushEvent;
#[cfg(feature = "http-client")]
pub use http::HttpApi;
pub use model::{CardId, CardStatus, CardView, GameSnapshot, TrackRef};
pub use notify::{ChannelSink, Notification, NotificationSink, TracingSink};
pub use protocol::{ClientSignal, ServerEvent};
pub use reconciler::{RefreshScope, StateReconciler};
pub use scheduler::{FallbackScheduler, Refresh};
pub use session::DashboardSession;
pub use transport::{Connector, Transport};
pub use validation::ValidationOrchestrator;

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
