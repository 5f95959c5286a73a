//! The dashboard session.
//!
//! [`DashboardSession`] owns every component of the sync core and wires them
//! together:
//!
//! - push-channel lifecycle events turn the backstop poll on and off and
//!   trigger a full resync on every (re)connect,
//! - server events go through the [`StateReconciler`], and the refresh it asks
//!   for runs in the background,
//! - user actions call the backend and refresh what they touched.
//!
//! All events are dispatched from one table ([`DashboardSession::dispatch`]),
//! one at a time, in arrival order.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = DashboardConfig::from_env();
//! let connector = Arc::new(WebSocketConnector::new(&config.channel_url));
//! let api = Arc::new(HttpApi::new(&config.base_url));
//! let (sink, mut notifications) = ChannelSink::new();
//!
//! let session = DashboardSession::new(config, connector, api, Arc::new(sink));
//! session.start().await;
//!
//! while let Some(note) = notifications.recv().await {
//!     println!("{note:?}");
//! }
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::api::{DashboardApi, PositionValidation, SavedGame};
use crate::config::DashboardConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{DashboardError, Result};
use crate::event::PushEvent;
use crate::model::{max_cards, CardId, CardView, GameSnapshot, TrackRef};
use crate::notify::{report, Notification, NotificationSink, TtlSink};
use crate::protocol::ClientSignal;
use crate::reconciler::{RefreshScope, ScopedRefresh, StateReconciler};
use crate::scheduler::{FallbackScheduler, PollTask};
use crate::store::{CardStore, DashboardView, ViewStore};
use crate::transport::Connector;
use crate::validation::{BatchReport, CardLoad, ValidationOrchestrator, ValidationOutcome};

/// Context of the error toast for a failed background refresh.
const REFRESH_FAILED: &str = "Failed to update game state";

/// One live dashboard.
pub struct DashboardSession {
    config: DashboardConfig,
    api: Arc<dyn DashboardApi>,
    sink: Arc<dyn NotificationSink>,
    connection: ConnectionManager,
    fallback: FallbackScheduler,
    steady: FallbackScheduler,
    reconciler: Arc<StateReconciler>,
    validator: ValidationOrchestrator,
    cards: Arc<CardStore>,
    view: Arc<ViewStore>,
    events: Mutex<Option<mpsc::Receiver<PushEvent>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    refreshes: Mutex<JoinSet<()>>,
}

impl DashboardSession {
    /// Assemble a session. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: DashboardConfig,
        connector: Arc<dyn Connector>,
        api: Arc<dyn DashboardApi>,
        sink: Arc<dyn NotificationSink>,
    ) -> Arc<Self> {
        let sink: Arc<dyn NotificationSink> =
            Arc::new(TtlSink::new(sink, config.notification_ttl));
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let cards = Arc::new(CardStore::new());
        let view = Arc::new(ViewStore::new(config.sequence_guard));
        let validator = ValidationOrchestrator::new(
            Arc::clone(&api),
            Arc::clone(&cards),
            Arc::clone(&view),
            Arc::clone(&sink),
        );
        let reconciler = Arc::new(StateReconciler::new(
            Arc::clone(&api),
            Arc::clone(&cards),
            Arc::clone(&view),
            validator.clone(),
            Arc::clone(&sink),
        ));
        let connection = ConnectionManager::new(
            connector,
            config.channel.clone(),
            event_tx,
            Arc::clone(&sink),
        )
        .with_shutdown_timeout(config.shutdown_timeout);

        Arc::new(Self {
            fallback: FallbackScheduler::new("fallback", Arc::clone(&sink)),
            steady: FallbackScheduler::new("steady", Arc::clone(&sink)),
            config,
            api,
            sink,
            connection,
            reconciler,
            validator,
            cards,
            view,
            events: Mutex::new(Some(event_rx)),
            background: Mutex::new(Vec::new()),
            refreshes: Mutex::new(JoinSet::new()),
        })
    }

    /// Start the session: event dispatch, the push channel, the initial full
    /// load, the optional steady refresh and the first-connect grace timer.
    ///
    /// Calling it a second time does nothing.
    pub async fn start(self: &Arc<Self>) {
        let Some(events) = self.events.lock().await.take() else {
            warn!("dashboard session already started");
            return;
        };
        info!(base_url = %self.config.base_url, channel_url = %self.config.channel_url, "starting dashboard session");

        let mut background = self.background.lock().await;
        background.push(tokio::spawn(dispatch_loop(Arc::downgrade(self), events)));

        self.connection.connect().await;
        self.spawn_refresh(RefreshScope::Full).await;

        if let Some(interval) = self.config.steady_refresh_interval {
            let refresh = ScopedRefresh::new(Arc::clone(&self.reconciler), RefreshScope::Playback);
            self.steady.start(interval, Arc::new(refresh)).await;
        }

        background.push(tokio::spawn(connect_grace(
            Arc::downgrade(self),
            self.connection.subscribe(),
        )));
    }

    /// Handle one event. Called by the dispatch loop for every event on the
    /// push channel, in order.
    pub async fn dispatch(&self, event: PushEvent) {
        debug!(event = event.name(), "dispatching");
        match event {
            PushEvent::Connect => {
                self.fallback.stop().await;
                self.spawn_refresh(RefreshScope::Full).await;
                if let Err(e) = self.connection.send(ClientSignal::RequestGameState).await {
                    debug!(error = %e, "could not request game state");
                }
            }
            PushEvent::Disconnect { reason } => {
                warn!(reason = reason.as_deref().unwrap_or("closed by server"), "push channel lost, polling");
                self.start_fallback().await;
            }
            PushEvent::ReconnectAttempt { attempt } => {
                self.sink
                    .notify(Notification::info(format!("Reconnecting (attempt {attempt})...")));
            }
            PushEvent::Reconnect { attempt } => {
                info!(attempt, "push channel back");
            }
            PushEvent::ReconnectFailed => {
                self.sink.notify(Notification::error(
                    "Lost connection to the server; updates will be polled",
                ));
                self.start_fallback().await;
            }
            PushEvent::ConnectError { .. } => {
                self.reconciler.reconcile(&event).await;
                self.start_fallback().await;
            }
            PushEvent::Error { .. }
            | PushEvent::GameState(_)
            | PushEvent::NewTrack(_)
            | PushEvent::CardStatusUpdate(_)
            | PushEvent::ConnectionStatus { .. } => {
                let scope = self.reconciler.reconcile(&event).await;
                self.spawn_refresh(scope).await;
            }
        }
    }

    /// Stop everything: dispatch, timers, the push channel and any refresh
    /// still running. Ends with the channel [`Disconnected`](ConnectionState::Disconnected).
    pub async fn shutdown(&self) {
        info!("shutting down dashboard session");
        for handle in self.background.lock().await.drain(..) {
            handle.abort();
        }
        self.fallback.stop().await;
        self.steady.stop().await;
        self.connection.shutdown().await;
        self.refreshes.lock().await.abort_all();
    }

    // ── Cards and validation ────────────────────────────────────────

    /// Check one card. See [`ValidationOrchestrator::validate_card`].
    pub async fn validate_card(&self, card_id: &CardId) -> Result<ValidationOutcome> {
        self.validator.validate_card(card_id).await
    }

    /// Check every known card. See [`ValidationOrchestrator::validate_all_cards`].
    pub async fn validate_all_cards(&self) -> BatchReport {
        self.validator.validate_all_cards().await
    }

    /// Check one placement and, if it holds, tell the other dashboards.
    pub async fn validate_card_position(
        &self,
        card_id: &CardId,
        track_id: &str,
        position: u8,
    ) -> Result<PositionValidation> {
        let verdict = self
            .validator
            .validate_card_position(card_id, track_id, position)
            .await?;
        if verdict.valid {
            let signal = ClientSignal::CardValidated {
                card_id: card_id.clone(),
            };
            if let Err(e) = self.connection.send(signal).await {
                debug!(%card_id, error = %e, "card_validated not sent");
            }
        }
        Ok(verdict)
    }

    /// Generate `num_cards` cards and load them.
    ///
    /// # Errors
    ///
    /// [`DashboardError::InvalidInput`] for zero cards, or for more cards than
    /// the loaded tracks allow once the track count is known.
    pub async fn generate_cards(&self, num_cards: u32) -> Result<CardLoad> {
        let context = "Failed to generate cards";
        if num_cards == 0 {
            return self.reported(
                context,
                Err(DashboardError::InvalidInput(
                    "number of cards must be at least 1".into(),
                )),
            );
        }
        let max = self.max_cards().await;
        if max > 0 && usize::try_from(num_cards).map_or(true, |n| n > max) {
            return self.reported(
                context,
                Err(DashboardError::InvalidInput(format!(
                    "at most {max} cards can be generated from the loaded tracks"
                ))),
            );
        }

        let message = self.reported(context, self.api.generate_cards(num_cards).await)?;
        info!(num_cards, "cards generated");
        self.sink.notify(Notification::success(message));
        self.reported("Failed to load cards", self.reconciler.load_cards().await)
    }

    /// The printable card sheet.
    pub async fn export_pdf(&self) -> Result<Vec<u8>> {
        match self.api.export_pdf().await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!(error = %e, "pdf export failed");
                if e.is_auth_required() {
                    report(self.sink.as_ref(), "Failed to download the PDF", &e);
                } else {
                    self.sink.notify(Notification::error(
                        "Failed to download the PDF. Please try again.",
                    ));
                }
                Err(e)
            }
        }
    }

    // ── Playback ────────────────────────────────────────────────────

    /// Play the next track, then refresh played tracks and cards.
    pub async fn play(&self) -> Result<TrackRef> {
        let track = self.reported("Failed to play", self.api.play().await)?;
        self.view.set_now_playing(Some(track.clone())).await;
        self.sink
            .notify(Notification::success(format!("Playing: {track}")));
        let (played, cards) = tokio::join!(
            self.reconciler.load_played_tracks(),
            self.reconciler.load_cards()
        );
        if let Err(e) = played.and(cards.map(drop)) {
            report(self.sink.as_ref(), REFRESH_FAILED, &e);
        }
        Ok(track)
    }

    pub async fn pause(&self) -> Result<()> {
        self.reported("Failed to pause", self.api.pause().await)?;
        self.sink.notify(Notification::success("Playback paused"));
        Ok(())
    }

    /// Start a new round: local round data is cleared before the cards are
    /// reloaded.
    pub async fn new_round(&self) -> Result<CardLoad> {
        self.reported("Failed to start a new round", self.api.new_round().await)?;
        self.view.reset_round().await;
        self.cards.reset_progress().await;
        self.sink.notify(Notification::success("New round started"));
        self.reported("Failed to load cards", self.reconciler.load_cards().await)
    }

    // ── Playlists and devices ───────────────────────────────────────

    pub async fn add_playlist(&self, playlist_id: &str, is_default: bool) -> Result<()> {
        let context = "Failed to add playlist";
        let playlist_id = playlist_id.trim();
        if playlist_id.is_empty() {
            return self.reported(
                context,
                Err(DashboardError::InvalidInput("Please enter a playlist ID".into())),
            );
        }
        self.reported(context, self.api.add_playlist(playlist_id, is_default).await)?;
        self.sink
            .notify(Notification::success("Playlist added successfully"));
        self.reported("Failed to load playlists", self.reconciler.load_playlists().await)
    }

    /// Make `playlist_id` the active playlist; everything is refreshed.
    pub async fn load_playlist(&self, playlist_id: &str) -> Result<()> {
        let message = self.reported(
            "Failed to load playlist",
            self.api.load_playlist(playlist_id).await,
        )?;
        self.sink.notify(Notification::success(message));
        self.reported(REFRESH_FAILED, self.reconciler.force_refresh_all().await)
    }

    pub async fn select_device(&self, device_id: &str) -> Result<()> {
        self.reported("Failed to select device", self.api.select_device(device_id).await)?;
        self.sink
            .notify(Notification::success("Device selected successfully"));
        self.refresh_devices().await
    }

    /// Reload the device list. An expired music-service login surfaces as a
    /// login redirect.
    pub async fn refresh_devices(&self) -> Result<()> {
        self.reported("Failed to load devices", self.reconciler.load_devices().await)
    }

    // ── Saved games ─────────────────────────────────────────────────

    pub async fn save_game(&self, name: &str, description: &str) -> Result<()> {
        let context = "Failed to save game";
        let name = name.trim();
        if name.is_empty() {
            return self.reported(
                context,
                Err(DashboardError::InvalidInput(
                    "Please enter a name for the saved game".into(),
                )),
            );
        }
        let message = self.reported(context, self.api.save_game(name, description).await)?;
        self.sink.notify(Notification::success(message));
        Ok(())
    }

    pub async fn list_saved_games(&self) -> Result<Vec<SavedGame>> {
        self.reported("Failed to list saved games", self.api.list_saved_games().await)
    }

    /// Restore a saved game and resync everything from it.
    pub async fn load_game(&self, filename: &str) -> Result<()> {
        let message = self.reported("Failed to load game", self.api.load_game(filename).await)?;
        self.sink.notify(Notification::success(message));
        self.reported(REFRESH_FAILED, self.reconciler.force_refresh_all().await)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub async fn cards(&self) -> Vec<CardView> {
        self.cards.all().await
    }

    pub async fn card(&self, card_id: &CardId) -> Option<CardView> {
        self.cards.get(card_id).await
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.view.snapshot().await
    }

    pub async fn view(&self) -> DashboardView {
        self.view.view().await
    }

    /// Most cards the loaded tracks allow.
    pub async fn max_cards(&self) -> usize {
        max_cards(self.view.snapshot().await.track_count)
    }

    pub async fn fallback_active(&self) -> bool {
        self.fallback.is_active().await
    }

    pub async fn fallback_task(&self) -> Option<PollTask> {
        self.fallback.task().await
    }

    pub async fn steady_refresh_active(&self) -> bool {
        self.steady.is_active().await
    }

    pub fn validator(&self) -> &ValidationOrchestrator {
        &self.validator
    }

    pub fn reconciler(&self) -> &Arc<StateReconciler> {
        &self.reconciler
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn start_fallback(&self) {
        let refresh = ScopedRefresh::new(Arc::clone(&self.reconciler), RefreshScope::Full);
        self.fallback
            .start(self.config.fallback_poll_interval, Arc::new(refresh))
            .await;
    }

    /// Run a refresh in the background; failures are reported, never
    /// returned.
    async fn spawn_refresh(&self, scope: RefreshScope) {
        if scope == RefreshScope::Nothing {
            return;
        }
        let reconciler = Arc::clone(&self.reconciler);
        let sink = Arc::clone(&self.sink);
        let mut refreshes = self.refreshes.lock().await;
        while refreshes.try_join_next().is_some() {}
        refreshes.spawn(async move {
            if let Err(e) = reconciler.refresh(scope).await {
                report(sink.as_ref(), REFRESH_FAILED, &e);
            }
        });
    }

    fn reported<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            report(self.sink.as_ref(), context, e);
        }
        result
    }
}

impl fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardSession")
            .field("base_url", &self.config.base_url)
            .field("connection", &self.connection.state())
            .finish_non_exhaustive()
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        for handle in self.background.get_mut().drain(..) {
            handle.abort();
        }
    }
}

// ── Background tasks ────────────────────────────────────────────────

/// Feed events to the session until the channel closes or the session is
/// dropped.
async fn dispatch_loop(session: Weak<DashboardSession>, mut events: mpsc::Receiver<PushEvent>) {
    while let Some(event) = events.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        session.dispatch(event).await;
    }
    debug!("dispatch loop exited");
}

/// Start the backstop poll if the first connect has not succeeded within the
/// grace period.
async fn connect_grace(session: Weak<DashboardSession>, state: watch::Receiver<ConnectionState>) {
    let Some(grace) = session.upgrade().map(|s| s.config.initial_connect_grace) else {
        return;
    };
    tokio::time::sleep(grace).await;
    if state.borrow().is_connected() {
        return;
    }
    if let Some(session) = session.upgrade() {
        info!(?grace, "push channel not up after grace period, polling");
        session.start_fallback().await;
    }
}
