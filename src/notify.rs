//! User-facing notifications.
//!
//! Every component reports to a [`NotificationSink`]: transient toasts,
//! connection-status changes and login redirects. Rendering is up to the
//! sink; the library only decides *what* to say and *when*.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connection::ConnectionState;
use crate::error::DashboardError;

/// Default lifetime of a toast before it auto-dismisses.
pub const DEFAULT_TOAST_TTL: Duration = Duration::from_secs(5);

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// A dismissible, auto-expiring message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Identifier a UI can use to dismiss the toast early.
    pub id: Uuid,
    pub level: ToastLevel,
    pub message: String,
    pub expires_after: Duration,
}

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A transient message.
    Toast(Toast),
    /// The push channel changed state.
    ConnectionStatus(ConnectionState),
    /// The backend needs the user to log in again; the session should be sent
    /// to the login flow instead of showing an error.
    LoginRequired { reason: String },
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self::toast(ToastLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::toast(ToastLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::toast(ToastLevel::Error, message)
    }

    fn toast(level: ToastLevel, message: impl Into<String>) -> Self {
        Self::Toast(Toast {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            expires_after: DEFAULT_TOAST_TTL,
        })
    }

    /// Override the toast lifetime. No effect on other notifications.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        if let Self::Toast(toast) = &mut self {
            toast.expires_after = ttl;
        }
        self
    }

    /// Message text of a toast.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Toast(toast) => Some(&toast.message),
            _ => None,
        }
    }

    /// Level of a toast.
    pub fn level(&self) -> Option<ToastLevel> {
        match self {
            Self::Toast(toast) => Some(toast.level),
            _ => None,
        }
    }
}

/// Consumer of notifications (UI layer, log, test recorder).
///
/// Called from inside async tasks; implementations must not block.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver that yields its notifications.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("notification receiver dropped");
        }
    }
}

/// Writes notifications to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::Toast(toast) => match toast.level {
                ToastLevel::Error => warn!(message = %toast.message, "notification"),
                ToastLevel::Info | ToastLevel::Success => {
                    info!(message = %toast.message, "notification")
                }
            },
            Notification::ConnectionStatus(state) => info!(%state, "connection status"),
            Notification::LoginRequired { reason } => warn!(%reason, "login required"),
        }
    }
}

/// Applies a fixed lifetime to every toast before forwarding it.
pub(crate) struct TtlSink {
    inner: Arc<dyn NotificationSink>,
    ttl: Duration,
}

impl TtlSink {
    pub(crate) fn new(inner: Arc<dyn NotificationSink>, ttl: Duration) -> Self {
        Self { inner, ttl }
    }
}

impl NotificationSink for TtlSink {
    fn notify(&self, notification: Notification) {
        self.inner.notify(notification.with_ttl(self.ttl));
    }
}

/// Surface a failure: log it, then redirect to login or show an error toast.
pub fn report(sink: &dyn NotificationSink, context: &str, err: &DashboardError) {
    if err.is_auth_required() {
        warn!(context, error = %err, "authentication required, redirecting to login");
        sink.notify(Notification::LoginRequired {
            reason: err.to_string(),
        });
    } else {
        error!(context, error = %err, "dashboard operation failed");
        sink.notify(Notification::error(format!("{context}: {err}")));
    }
}
