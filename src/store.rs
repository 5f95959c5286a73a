//! Local state of the dashboard.
//!
//! [`CardStore`] is the source of truth for every known card. [`ViewStore`]
//! holds the aggregate data around it (game snapshot, stats, played tracks,
//! playlists, devices). Any handler may overwrite either at any time; both
//! are always re-derivable from the next full refresh.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use crate::model::{
    CardId, CardStatus, CardView, Device, GameSnapshot, GameStats, Playlist, StatusChange,
    TrackRef,
};

// ── Cards ───────────────────────────────────────────────────────────

/// Result of [`CardStore::replace_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replaced {
    /// Cards now held.
    pub loaded: usize,
    /// Known cards that moved into `Bingo` with this load.
    pub entered_bingo: Vec<CardId>,
}

/// Map of all known cards, keyed by id.
#[derive(Debug, Default)]
pub struct CardStore {
    cards: RwLock<BTreeMap<CardId, CardView>>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole store.
    ///
    /// Cards that were already known in a non-winning status and arrive as
    /// `Bingo` are listed in [`Replaced::entered_bingo`]. Cards seen for the
    /// first time never are.
    pub async fn replace_all(&self, cards: impl IntoIterator<Item = CardView>) -> Replaced {
        let fresh: BTreeMap<_, _> = cards.into_iter().map(|c| (c.id.clone(), c)).collect();
        let mut guard = self.cards.write().await;
        let entered_bingo = fresh
            .values()
            .filter(|card| card.bingo_status.is_bingo())
            .filter(|card| {
                guard
                    .get(&card.id)
                    .is_some_and(|old| !old.bingo_status.is_bingo())
            })
            .map(|card| card.id.clone())
            .collect();
        *guard = fresh;
        Replaced {
            loaded: guard.len(),
            entered_bingo,
        }
    }

    /// Patch one card's status and matched positions in place.
    ///
    /// A card that is already [`Bingo`](CardStatus::Bingo) keeps its state
    /// when the patch carries a lower status; only a wholesale
    /// [`replace_all`](Self::replace_all) can take it out of `Bingo`.
    ///
    /// Returns `None` for unknown ids.
    pub async fn patch(
        &self,
        id: &CardId,
        status: CardStatus,
        matched_positions: BTreeSet<u8>,
    ) -> Option<StatusChange> {
        let mut cards = self.cards.write().await;
        let Some(card) = cards.get_mut(id) else {
            debug!(card_id = %id, "patch for unknown card ignored");
            return None;
        };

        let previous = card.bingo_status;
        if previous.is_bingo() && !status.is_bingo() {
            debug!(card_id = %id, incoming = %status, "stale status ignored, card already won");
            return Some(StatusChange {
                previous,
                current: previous,
            });
        }

        card.bingo_status = status;
        card.matched_positions = matched_positions;
        Some(StatusChange {
            previous,
            current: status,
        })
    }

    /// Drop every card's matches and status (new round).
    pub async fn reset_progress(&self) {
        for card in self.cards.write().await.values_mut() {
            card.matched_positions.clear();
            card.bingo_status = CardStatus::NotChecked;
        }
    }

    pub async fn ids(&self) -> Vec<CardId> {
        self.cards.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, id: &CardId) -> Option<CardView> {
        self.cards.read().await.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<CardView> {
        self.cards.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.cards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cards.read().await.is_empty()
    }
}

// ── Aggregates ──────────────────────────────────────────────────────

/// Everything on the dashboard that is not a card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    pub snapshot: GameSnapshot,
    pub stats: GameStats,
    pub played_tracks: Vec<TrackRef>,
    pub now_playing: Option<TrackRef>,
    pub playlists: Vec<Playlist>,
    pub devices: Vec<Device>,
}

/// Holder of the [`DashboardView`].
///
/// Snapshot writes carry a sequence number taken when the data was requested.
/// With the guard enabled, a snapshot older than the applied one is
/// discarded; without it the last write wins.
#[derive(Debug)]
pub struct ViewStore {
    view: RwLock<DashboardView>,
    sequence_guard: bool,
    issued: AtomicU64,
    applied: AtomicU64,
}

impl ViewStore {
    pub fn new(sequence_guard: bool) -> Self {
        Self {
            view: RwLock::new(DashboardView::default()),
            sequence_guard,
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    /// Take a sequence number before requesting a snapshot.
    pub fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Apply a snapshot requested at `seq`. Returns `false` if the sequence
    /// guard discarded it.
    pub async fn replace_snapshot(&self, seq: u64, snapshot: GameSnapshot) -> bool {
        let mut view = self.view.write().await;
        if self.sequence_guard && seq < self.applied.load(Ordering::Relaxed) {
            debug!(seq, applied = self.applied.load(Ordering::Relaxed), "discarding stale snapshot");
            return false;
        }
        self.applied.fetch_max(seq, Ordering::Relaxed);
        view.snapshot = snapshot;
        true
    }

    pub async fn set_stats(&self, stats: GameStats) {
        self.view.write().await.stats = stats;
    }

    pub async fn set_played_tracks(&self, tracks: Vec<TrackRef>) {
        self.view.write().await.played_tracks = tracks;
    }

    pub async fn set_now_playing(&self, track: Option<TrackRef>) {
        self.view.write().await.now_playing = track;
    }

    pub async fn set_playlists(&self, playlists: Vec<Playlist>) {
        self.view.write().await.playlists = playlists;
    }

    pub async fn set_devices(&self, devices: Vec<Device>) {
        self.view.write().await.devices = devices;
    }

    /// Clear round-scoped data: played tracks and the current track.
    pub async fn reset_round(&self) {
        let mut view = self.view.write().await;
        view.played_tracks.clear();
        view.now_playing = None;
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.view.read().await.snapshot.clone()
    }

    pub async fn view(&self) -> DashboardView {
        self.view.read().await.clone()
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new(false)
    }
}
