//! Event-to-refresh policy.
//!
//! [`StateReconciler`] decides, for each inbound [`PushEvent`], what to patch
//! locally and what to re-fetch. Local patches are applied immediately;
//! re-fetches are described by a [`RefreshScope`] that the session runs in
//! the background, so a slow request never holds up the next event.
//!
//! Overlapping refreshes are not sequenced: whichever response lands last is
//! what the stores hold (see [`ViewStore`] for the optional snapshot guard).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::DashboardApi;
use crate::error::{DashboardError, Result};
use crate::event::PushEvent;
use crate::model::{matched_positions, CardStatus};
use crate::notify::{report, Notification, NotificationSink};
use crate::scheduler::Refresh;
use crate::store::{CardStore, ViewStore};
use crate::validation::{announce_bingo, CardLoad, ValidationOrchestrator};

/// What an event requires to be re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    Nothing,
    /// Card store reload (plus the validation batch it triggers).
    Cards,
    /// Played tracks, cards, stats and dashboard snapshot as one group.
    Playback,
    /// Everything: playlists, devices, played tracks, cards, stats and
    /// dashboard snapshot.
    Full,
}

/// Applies events and refreshes to the local stores.
pub struct StateReconciler {
    api: Arc<dyn DashboardApi>,
    cards: Arc<CardStore>,
    view: Arc<ViewStore>,
    validator: ValidationOrchestrator,
    sink: Arc<dyn NotificationSink>,
}

impl StateReconciler {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        cards: Arc<CardStore>,
        view: Arc<ViewStore>,
        validator: ValidationOrchestrator,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            api,
            cards,
            view,
            validator,
            sink,
        }
    }

    /// Apply the local effect of a server event and return the refresh it
    /// calls for. Lifecycle events are not handled here and return
    /// [`RefreshScope::Nothing`].
    pub async fn reconcile(&self, event: &PushEvent) -> RefreshScope {
        match event {
            PushEvent::GameState(payload) => {
                let seq = self.view.next_seq();
                let snapshot = payload.to_snapshot();
                debug!(
                    cards = snapshot.card_count,
                    played = snapshot.played_count,
                    "applying pushed game state"
                );
                self.view.replace_snapshot(seq, snapshot).await;
                RefreshScope::Nothing
            }
            PushEvent::NewTrack(payload) => {
                info!(track = %payload.track, "new track");
                self.view.set_now_playing(Some(payload.track.clone())).await;
                self.sink
                    .notify(Notification::success(format!("Now playing: {}", payload.track)));
                RefreshScope::Playback
            }
            PushEvent::CardStatusUpdate(payload) => {
                let status = CardStatus::from_wire(&payload.status, !payload.matches.is_empty());
                let matched = matched_positions(&payload.card_id, &payload.matches);
                let change = self.cards.patch(&payload.card_id, status, matched).await;
                if change.is_some_and(|c| c.entered_bingo()) {
                    announce_bingo(self.sink.as_ref(), &payload.card_id);
                }
                RefreshScope::Cards
            }
            PushEvent::Error { message } => {
                report(
                    self.sink.as_ref(),
                    "Server error",
                    &DashboardError::Channel(message.clone()),
                );
                RefreshScope::Nothing
            }
            PushEvent::ConnectError { message } => {
                report(
                    self.sink.as_ref(),
                    "Connection error",
                    &DashboardError::Channel(message.clone()),
                );
                RefreshScope::Nothing
            }
            PushEvent::ConnectionStatus { status } => {
                debug!(%status, "backend acknowledged connection");
                RefreshScope::Nothing
            }
            PushEvent::Connect
            | PushEvent::Disconnect { .. }
            | PushEvent::ReconnectAttempt { .. }
            | PushEvent::Reconnect { .. }
            | PushEvent::ReconnectFailed => RefreshScope::Nothing,
        }
    }

    /// Run the refresh for `scope`.
    ///
    /// # Errors
    ///
    /// The first failure of the group; the caller reports it.
    pub async fn refresh(&self, scope: RefreshScope) -> Result<()> {
        match scope {
            RefreshScope::Nothing => Ok(()),
            RefreshScope::Cards => self.load_cards().await.map(drop),
            RefreshScope::Playback => self.refresh_playback().await,
            RefreshScope::Full => self.force_refresh_all().await,
        }
    }

    /// The full resync. All six loads run concurrently and each applies its
    /// own result; one failing does not stop the others.
    ///
    /// # Errors
    ///
    /// The first failure in load order.
    pub async fn force_refresh_all(&self) -> Result<()> {
        debug!("full refresh");
        let (playlists, devices, played, cards, stats, dashboard) = tokio::join!(
            self.load_playlists(),
            self.load_devices(),
            self.load_played_tracks(),
            self.load_cards(),
            self.update_game_stats(),
            self.update_dashboard_data(),
        );
        first_error([
            playlists,
            devices,
            played,
            cards.map(drop),
            stats,
            dashboard,
        ])
    }

    /// The group refreshed after playback advances.
    ///
    /// # Errors
    ///
    /// The first failure in load order.
    pub async fn refresh_playback(&self) -> Result<()> {
        let (played, cards, stats, dashboard) = tokio::join!(
            self.load_played_tracks(),
            self.load_cards(),
            self.update_game_stats(),
            self.update_dashboard_data(),
        );
        first_error([played, cards.map(drop), stats, dashboard])
    }

    // ── Individual loads ────────────────────────────────────────────

    pub async fn load_playlists(&self) -> Result<()> {
        let playlists = self.api.playlists().await?;
        self.view.set_playlists(playlists).await;
        Ok(())
    }

    pub async fn load_devices(&self) -> Result<()> {
        let devices = self.api.devices().await?;
        self.view.set_devices(devices).await;
        Ok(())
    }

    pub async fn load_played_tracks(&self) -> Result<()> {
        let tracks = self.api.played_tracks().await?;
        self.view.set_played_tracks(tracks).await;
        Ok(())
    }

    /// Reload the card store and validate every card.
    pub async fn load_cards(&self) -> Result<CardLoad> {
        self.validator.reload_cards().await
    }

    pub async fn update_game_stats(&self) -> Result<()> {
        self.validator.refresh_stats().await
    }

    /// Fetch the dashboard snapshot together with the stats.
    pub async fn update_dashboard_data(&self) -> Result<()> {
        let seq = self.view.next_seq();
        let (data, stats) = tokio::try_join!(self.api.dashboard_data(), self.api.dashboard_stats())?;
        if !self.view.replace_snapshot(seq, data.to_snapshot()).await {
            debug!(seq, "dashboard snapshot superseded");
        }
        self.view.set_stats(stats).await;
        Ok(())
    }
}

impl fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReconciler").finish_non_exhaustive()
    }
}

fn first_error<const N: usize>(results: [Result<()>; N]) -> Result<()> {
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 1 {
        warn!(failed, "several loads failed in one refresh");
    }
    results.into_iter().collect()
}

/// A [`RefreshScope`] bound to a reconciler, for use as a scheduler tick.
pub struct ScopedRefresh {
    reconciler: Arc<StateReconciler>,
    scope: RefreshScope,
}

impl ScopedRefresh {
    pub fn new(reconciler: Arc<StateReconciler>, scope: RefreshScope) -> Self {
        Self { reconciler, scope }
    }
}

#[async_trait]
impl Refresh for ScopedRefresh {
    async fn refresh(&self) -> Result<()> {
        self.reconciler.refresh(self.scope).await
    }
}
