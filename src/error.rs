//! Error types for the bingo dashboard client.

use std::sync::Arc;

use thiserror::Error;

/// Phrase the backend puts in error messages when the music-service session
/// has expired. Matched case-insensitively.
const AUTH_REQUIRED_PHRASE: &str = "authentication required";

/// Errors that can occur while synchronizing the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// An HTTP request could not be completed (connection refused, DNS, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the response body, or a generic description.
        message: String,
    },

    /// The backend requires the user to log in again.
    #[error("{0}")]
    AuthRequired(String),

    /// Failed to send a message through the push channel.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the push channel.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The push channel was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// The push channel reported an error of its own.
    #[error("channel error: {0}")]
    Channel(String),

    /// An operation timed out (the push-channel handshake).
    #[error("operation timed out")]
    Timeout,

    /// An outbound signal needs a live push channel, but it is not connected.
    #[error("push channel not connected")]
    NotConnected,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A payload parsed but did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A caller-supplied argument was rejected before any request was made.
    #[error("{0}")]
    InvalidInput(String),

    /// A background task panicked or was aborted.
    #[error("background task failed: {0}")]
    TaskFailed(String),

    /// An error observed through a validation ticket owned by another caller.
    #[error(transparent)]
    Shared(Arc<DashboardError>),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`DashboardError`], used to decide how a failure
/// is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request failed or non-success status.
    Transport,
    /// The session must be redirected to the login flow.
    AuthRequired,
    /// Push-channel error or timeout.
    Channel,
    /// Malformed or unexpected payload.
    Protocol,
    /// Rejected input or an internal task failure.
    Local,
}

impl DashboardError {
    /// Build an error from a non-success HTTP response.
    ///
    /// Messages containing "authentication required" become
    /// [`DashboardError::AuthRequired`].
    pub fn from_server(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains(AUTH_REQUIRED_PHRASE) {
            Self::AuthRequired(message)
        } else {
            Self::Status { status, message }
        }
    }

    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Request(_) | Self::Status { .. } | Self::Io(_) => ErrorCategory::Transport,
            Self::AuthRequired(_) => ErrorCategory::AuthRequired,
            Self::TransportSend(_)
            | Self::TransportReceive(_)
            | Self::TransportClosed
            | Self::Channel(_)
            | Self::Timeout
            | Self::NotConnected => ErrorCategory::Channel,
            Self::Serialization(_) | Self::Protocol(_) => ErrorCategory::Protocol,
            Self::InvalidInput(_) | Self::TaskFailed(_) => ErrorCategory::Local,
            Self::Shared(inner) => inner.category(),
        }
    }

    /// Returns `true` if the session should be redirected to the login flow.
    pub fn is_auth_required(&self) -> bool {
        self.category() == ErrorCategory::AuthRequired
    }
}

/// A specialized [`Result`] type for dashboard client operations.
pub type Result<T> = std::result::Result<T, DashboardError>;
