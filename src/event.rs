//! Events delivered to the dashboard session.
//!
//! [`PushEvent`] merges the push channel's lifecycle notifications (synthesized
//! by the connection loop) with the events the backend pushes. A session
//! consumes them from a single ordered stream.

use crate::protocol::{CardStatusPayload, GameStatePayload, NewTrackPayload, ServerEvent};

/// An event observed on the push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    // ── Lifecycle ───────────────────────────────────────────────────
    /// The channel connected (initially or after a reconnect).
    Connect,
    /// The channel dropped.
    Disconnect {
        /// Why the channel closed, if known.
        reason: Option<String>,
    },
    /// A connection attempt failed (handshake error or timeout).
    ConnectError { message: String },
    /// The channel is about to retry; `attempt` starts at 1.
    ReconnectAttempt { attempt: u32 },
    /// A retry succeeded after `attempt` tries. Always followed by
    /// [`Connect`](Self::Connect).
    Reconnect { attempt: u32 },
    /// The retry budget is exhausted; the channel stays down.
    ReconnectFailed,

    // ── Server events ───────────────────────────────────────────────
    /// The backend reported an error.
    Error { message: String },
    /// Full game state.
    GameState(Box<GameStatePayload>),
    /// A new track started playing.
    NewTrack(NewTrackPayload),
    /// One card changed status.
    CardStatusUpdate(CardStatusPayload),
    /// Backend acknowledgement of the connection.
    ConnectionStatus { status: String },
}

impl PushEvent {
    /// Wire name of the event, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::ConnectError { .. } => "connect_error",
            Self::ReconnectAttempt { .. } => "reconnect_attempt",
            Self::Reconnect { .. } => "reconnect",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Error { .. } => "error",
            Self::GameState(_) => "game_state",
            Self::NewTrack(_) => "new_track",
            Self::CardStatusUpdate(_) => "card_status_update",
            Self::ConnectionStatus { .. } => "connection_status",
        }
    }

    /// Returns `true` for events synthesized by the connection loop.
    ///
    /// Lifecycle events are never dropped when the event channel is full.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Connect
                | Self::Disconnect { .. }
                | Self::ConnectError { .. }
                | Self::ReconnectAttempt { .. }
                | Self::Reconnect { .. }
                | Self::ReconnectFailed
        )
    }
}

impl From<ServerEvent> for PushEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::GameState(payload) => Self::GameState(payload),
            ServerEvent::NewTrack(payload) => Self::NewTrack(payload),
            ServerEvent::CardStatusUpdate(payload) => Self::CardStatusUpdate(payload),
            ServerEvent::Error(payload) => Self::Error {
                message: payload.message,
            },
            ServerEvent::ConnectionStatus { status } => Self::ConnectionStatus { status },
        }
    }
}
