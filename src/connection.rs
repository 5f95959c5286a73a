//! Push-channel lifecycle.
//!
//! [`ConnectionManager`] owns the push channel: it dials through a
//! [`Connector`], pumps frames between the transport and the session, and
//! retries with capped exponential backoff when the channel fails. Lifecycle
//! transitions are published three ways:
//!
//! - as [`ConnectionState`] on a `watch` channel ([`ConnectionManager::subscribe`]),
//! - as [`Notification::ConnectionStatus`] on the notification sink,
//! - as lifecycle [`PushEvent`]s on the event channel, interleaved in order
//!   with the server events they bracket.
//!
//! ```text
//! Disconnected ─connect()─▶ Connecting ─ok─▶ Connected
//!                               │               │ drop
//!                               ▼ fail          ▼
//!                        Reconnecting(n) ◀── Disconnected
//!                               │
//!                               ├─ok─▶ Connected
//!                               └─n > max_attempts─▶ Disconnected (exhausted)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::error::{DashboardError, Result};
use crate::event::PushEvent;
use crate::notify::{Notification, NotificationSink};
use crate::protocol::{ClientSignal, ServerEvent};
use crate::transport::{Connector, Transport};

/// Default timeout for the graceful shutdown of the channel loop.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// State of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting to retry; `attempt` starts at 1.
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Connecting => f.write_str("Connecting"),
            Self::Connected => f.write_str("Connected"),
            Self::Reconnecting { attempt } => write!(f, "Reconnecting (attempt {attempt})"),
        }
    }
}

/// Single writer of [`ConnectionState`]. Every actual transition is
/// forwarded to the notification sink.
struct StateCell {
    tx: watch::Sender<ConnectionState>,
    sink: Arc<dyn NotificationSink>,
}

impl StateCell {
    fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    fn set(&self, next: ConnectionState) {
        let mut previous = next;
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = *current;
            *current = next;
            true
        });
        if changed {
            debug!(from = %previous, to = %next, "connection state changed");
            self.sink.notify(Notification::ConnectionStatus(next));
        }
    }
}

/// Handles to a running channel loop.
struct ChannelTask {
    handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    cmd_tx: mpsc::UnboundedSender<ClientSignal>,
}

/// Owns the push channel and its reconnection policy.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: ChannelConfig,
    event_tx: mpsc::Sender<PushEvent>,
    state: Arc<StateCell>,
    task: Mutex<Option<ChannelTask>>,
    shutdown_timeout: Duration,
}

impl ConnectionManager {
    /// Create a manager in the [`Disconnected`](ConnectionState::Disconnected)
    /// state. Nothing is dialed until [`connect`](Self::connect).
    ///
    /// Lifecycle and server events are delivered on `event_tx`.
    pub fn new(
        connector: Arc<dyn Connector>,
        config: ChannelConfig,
        event_tx: mpsc::Sender<PushEvent>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            config,
            event_tx,
            state: Arc::new(StateCell { tx, sink }),
            task: Mutex::new(None),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set how long [`shutdown`](Self::shutdown) waits for the channel loop
    /// before aborting it.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Open the push channel.
    ///
    /// No-op while a channel loop is running (connecting, connected or
    /// retrying). After the retry budget is exhausted, calling this again
    /// starts over with a fresh attempt counter.
    pub async fn connect(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!(state = %self.state.get(), "connect ignored, channel loop already running");
            return;
        }

        self.state.set(ConnectionState::Connecting);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let ctx = LoopContext {
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            state: Arc::clone(&self.state),
        };
        let handle = tokio::spawn(channel_loop(ctx, cmd_rx, shutdown_rx));

        *task = Some(ChannelTask {
            handle,
            shutdown_tx: Some(shutdown_tx),
            cmd_tx,
        });
    }

    /// Queue an outbound signal.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::NotConnected`] unless the channel is
    /// [`Connected`](ConnectionState::Connected).
    pub async fn send(&self, signal: ClientSignal) -> Result<()> {
        if !self.state.get().is_connected() {
            return Err(DashboardError::NotConnected);
        }
        let task = self.task.lock().await;
        let task = task.as_ref().ok_or(DashboardError::NotConnected)?;
        task.cmd_tx
            .send(signal)
            .map_err(|_| DashboardError::NotConnected)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.tx.subscribe()
    }

    /// Stop the channel loop and close the transport.
    ///
    /// Waits up to the shutdown timeout for a graceful close, then aborts the
    /// loop. Ends in [`Disconnected`](ConnectionState::Disconnected). No
    /// `disconnect` event is emitted for a requested shutdown.
    pub async fn shutdown(&self) {
        let task = self.task.lock().await.take();
        if let Some(mut task) = task {
            debug!("push channel shutdown requested");
            if let Some(tx) = task.shutdown_tx.take() {
                let _ = tx.send(());
            }
            match tokio::time::timeout(self.shutdown_timeout, &mut task.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("channel loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("channel loop did not exit within timeout; aborting task");
                    task.handle.abort();
                    if let Err(join_err) = task.handle.await {
                        debug!("channel loop aborted: {join_err}");
                    }
                }
            }
        }
        self.state.set(ConnectionState::Disconnected);
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state.get())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Nothing can be awaited here, so the loop is aborted instead of
        // being asked to close the transport.
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}

// ── Channel loop ────────────────────────────────────────────────────

struct LoopContext {
    connector: Arc<dyn Connector>,
    config: ChannelConfig,
    event_tx: mpsc::Sender<PushEvent>,
    state: Arc<StateCell>,
}

/// Why [`pump`] returned.
enum PumpExit {
    /// Shutdown was requested; the transport is closed.
    Shutdown,
    /// The channel dropped.
    Dropped(Option<String>),
}

/// Dial, pump and retry until shutdown or until the retry budget is spent.
async fn channel_loop(
    ctx: LoopContext,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientSignal>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("channel loop started");
    let mut attempt: u32 = 0;

    loop {
        let dialed = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            dialed = tokio::time::timeout(ctx.config.handshake_timeout, ctx.connector.connect()) => {
                dialed.unwrap_or_else(|_| Err(DashboardError::Timeout))
            }
        };

        match dialed {
            Ok(mut transport) => {
                ctx.state.set(ConnectionState::Connected);
                if attempt > 0 {
                    info!(attempt, "push channel reconnected");
                    emit(&ctx.event_tx, PushEvent::Reconnect { attempt }).await;
                } else {
                    info!("push channel connected");
                }
                emit(&ctx.event_tx, PushEvent::Connect).await;
                attempt = 0;

                match pump(transport.as_mut(), &ctx.event_tx, &mut cmd_rx, &mut shutdown_rx).await {
                    PumpExit::Shutdown => break,
                    PumpExit::Dropped(reason) => {
                        warn!(reason = reason.as_deref().unwrap_or("closed by server"), "push channel dropped");
                        ctx.state.set(ConnectionState::Disconnected);
                        emit(&ctx.event_tx, PushEvent::Disconnect { reason }).await;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "push channel connect failed");
                emit(
                    &ctx.event_tx,
                    PushEvent::ConnectError {
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }

        if !ctx.config.retry {
            ctx.state.set(ConnectionState::Disconnected);
            break;
        }

        attempt = attempt.saturating_add(1);
        if attempt > ctx.config.max_attempts {
            error!(
                max_attempts = ctx.config.max_attempts,
                "push channel retry budget exhausted"
            );
            ctx.state.set(ConnectionState::Disconnected);
            emit(&ctx.event_tx, PushEvent::ReconnectFailed).await;
            break;
        }

        ctx.state.set(ConnectionState::Reconnecting { attempt });
        emit(&ctx.event_tx, PushEvent::ReconnectAttempt { attempt }).await;

        let delay = ctx.config.backoff(attempt);
        debug!(attempt, ?delay, "waiting before reconnect");
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("channel loop exited");
}

/// Multiplex outbound signals and inbound frames over one transport.
async fn pump(
    transport: &mut dyn Transport,
    event_tx: &mpsc::Sender<PushEvent>,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientSignal>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> PumpExit {
    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(signal) = cmd else {
                    debug!("command channel closed, closing push channel");
                    let _ = transport.close().await;
                    return PumpExit::Shutdown;
                };
                match serde_json::to_string(&signal) {
                    Ok(json) => {
                        if let Err(e) = transport.send(json).await {
                            return PumpExit::Dropped(Some(e.to_string()));
                        }
                    }
                    Err(e) => error!("failed to serialize client signal: {e}"),
                }
            }

            _ = &mut *shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                return PumpExit::Shutdown;
            }

            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => emit(event_tx, PushEvent::from(event)).await,
                    Err(e) => warn!(error = %e, raw = %text, "skipping malformed push frame"),
                },
                Some(Err(e)) => return PumpExit::Dropped(Some(e.to_string())),
                None => return PumpExit::Dropped(None),
            },
        }
    }
}

/// Forward an event to the session.
///
/// Lifecycle events wait for room in the channel since they drive the
/// fallback poll. Server events are dropped with a warning when the session
/// lags so the pump never blocks.
async fn emit(event_tx: &mpsc::Sender<PushEvent>, event: PushEvent) {
    if event.is_lifecycle() {
        if event_tx.send(event).await.is_err() {
            debug!("event channel closed, receiver dropped");
        }
        return;
    }
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(event = dropped.name(), "event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Replays scripted frames, then stays open until closed.
    struct MockTransport {
        incoming: VecDeque<Option<Result<String>>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Hands out one scripted outcome per connect call; refuses once empty.
    struct MockConnector {
        script: StdMutex<VecDeque<Result<Vec<Option<Result<String>>>>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        dials: StdMutex<u32>,
    }

    impl MockConnector {
        fn new(script: Vec<Result<Vec<Option<Result<String>>>>>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                sent: Arc::new(StdMutex::new(Vec::new())),
                dials: StdMutex::new(0),
            })
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self) -> Result<Box<dyn Transport>> {
            *self.dials.lock().unwrap() += 1;
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(incoming)) => Ok(Box::new(MockTransport {
                    incoming: incoming.into(),
                    sent: Arc::clone(&self.sent),
                })),
                Some(Err(e)) => Err(e),
                None => Err(DashboardError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                ))),
            }
        }
    }

    struct NullSink;

    impl NotificationSink for NullSink {
        fn notify(&self, _notification: Notification) {}
    }

    fn manager(
        connector: Arc<MockConnector>,
        config: ChannelConfig,
    ) -> (ConnectionManager, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (
            ConnectionManager::new(connector, config, tx, Arc::new(NullSink)),
            rx,
        )
    }

    #[tokio::test]
    async fn connect_emits_connect_and_forwards_server_events() {
        let frame = r#"{"event":"connection_status","data":{"status":"connected"}}"#;
        let connector = MockConnector::new(vec![Ok(vec![Some(Ok(frame.to_string()))])]);
        let (mgr, mut rx) = manager(connector, ChannelConfig::default());

        mgr.connect().await;
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Connect);
        assert_eq!(
            rx.recv().await.unwrap(),
            PushEvent::ConnectionStatus {
                status: "connected".into()
            }
        );
        assert_eq!(mgr.state(), ConnectionState::Connected);
        mgr.shutdown().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn full_channel_drops_server_events_but_holds_lifecycle() {
        let (tx, mut rx) = mpsc::channel(1);
        emit(&tx, PushEvent::ConnectionStatus { status: "connected".into() }).await;
        emit(&tx, PushEvent::Error { message: "lagging".into() }).await;

        let pending = tokio::spawn({
            let tx = tx.clone();
            async move { emit(&tx, PushEvent::Disconnect { reason: None }).await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert_eq!(rx.recv().await.unwrap().name(), "connection_status");
        pending.await.unwrap();
        assert!(matches!(rx.recv().await, Some(PushEvent::Disconnect { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_running() {
        let connector = MockConnector::new(vec![Ok(vec![])]);
        let (mgr, mut rx) = manager(Arc::clone(&connector), ChannelConfig::default());

        mgr.connect().await;
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Connect);
        mgr.connect().await;
        mgr.connect().await;
        tokio::task::yield_now().await;
        assert_eq!(*connector.dials.lock().unwrap(), 1);
        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn send_requires_connected_state() {
        let connector = MockConnector::new(vec![Ok(vec![])]);
        let (mgr, mut rx) = manager(Arc::clone(&connector), ChannelConfig::default());

        let err = mgr.send(ClientSignal::RequestGameState).await.unwrap_err();
        assert!(matches!(err, DashboardError::NotConnected));

        mgr.connect().await;
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Connect);
        mgr.send(ClientSignal::RequestGameState).await.unwrap();
        mgr.shutdown().await;

        let sent = connector.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![r#"{"event":"request_game_state"}"#.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_then_reconnect_reports_attempt() {
        let connector = MockConnector::new(vec![Ok(vec![None]), Ok(vec![])]);
        let (mgr, mut rx) = manager(connector, ChannelConfig::default());

        mgr.connect().await;
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Connect);
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Disconnect { reason: None });
        assert_eq!(
            rx.recv().await.unwrap(),
            PushEvent::ReconnectAttempt { attempt: 1 }
        );
        assert_eq!(mgr.state(), ConnectionState::Reconnecting { attempt: 1 });
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Reconnect { attempt: 1 });
        assert_eq!(rx.recv().await.unwrap(), PushEvent::Connect);
        assert_eq!(mgr.state(), ConnectionState::Connected);
        mgr.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_end_disconnected() {
        let connector = MockConnector::new(vec![]);
        let config = ChannelConfig::default().with_max_attempts(2);
        let (mgr, mut rx) = manager(Arc::clone(&connector), config);

        mgr.connect().await;
        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event == PushEvent::ReconnectFailed;
            names.push(event.name());
            if done {
                break;
            }
        }
        assert_eq!(
            names,
            vec![
                "connect_error",
                "reconnect_attempt",
                "connect_error",
                "reconnect_attempt",
                "connect_error",
                "reconnect_failed",
            ]
        );
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(*connector.dials.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_timeout_counts_as_connect_error() {
        struct Hanging;

        #[async_trait]
        impl Connector for Hanging {
            async fn connect(&self) -> Result<Box<dyn Transport>> {
                std::future::pending().await
            }
        }

        let (tx, mut rx) = mpsc::channel(8);
        let config = ChannelConfig::default().with_retry(false);
        let mgr = ConnectionManager::new(Arc::new(Hanging), config, tx, Arc::new(NullSink));
        mgr.connect().await;

        match rx.recv().await.unwrap() {
            PushEvent::ConnectError { message } => assert_eq!(message, "operation timed out"),
            other => panic!("expected ConnectError, got {other:?}"),
        }
        tokio::task::yield_now().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn state_display_names_attempt() {
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 3 }.to_string(),
            "Reconnecting (attempt 3)"
        );
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
