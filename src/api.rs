//! HTTP collaborators of the dashboard.
//!
//! [`DashboardApi`] is the seam between the sync core and the backend's JSON
//! endpoints. [`HttpApi`](crate::http::HttpApi) implements it over `reqwest`;
//! tests substitute an in-memory implementation.
//!
//! Every non-success response maps to a [`DashboardError`](crate::DashboardError)
//! through [`DashboardError::from_server`](crate::DashboardError::from_server),
//! so an "authentication required" message always surfaces as
//! [`AuthRequired`](crate::DashboardError::AuthRequired).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CardId, CardStatus, Device, GameSnapshot, GameStats, Playlist, TrackRef};
use crate::protocol::{CardPayload, Tally};

/// The backend's HTTP surface, one method per endpoint.
#[async_trait]
pub trait DashboardApi: Send + Sync + 'static {
    // ── Reads ───────────────────────────────────────────────────────

    async fn playlists(&self) -> Result<Vec<Playlist>>;

    async fn devices(&self) -> Result<Vec<Device>>;

    async fn played_tracks(&self) -> Result<Vec<TrackRef>>;

    /// The full card store.
    async fn cards(&self) -> Result<BTreeMap<CardId, CardPayload>>;

    /// Re-evaluate one card against the played tracks.
    async fn check_card(&self, card_id: &CardId) -> Result<CardCheck>;

    async fn dashboard_data(&self) -> Result<DashboardData>;

    async fn dashboard_stats(&self) -> Result<GameStats>;

    // ── Cards ───────────────────────────────────────────────────────

    /// Check that the track at `position` on a card was played.
    async fn validate_position(&self, request: &PositionRequest) -> Result<PositionValidation>;

    /// Generate `num_cards` new cards. Returns the backend's message.
    async fn generate_cards(&self, num_cards: u32) -> Result<String>;

    /// Printable card sheet as a PDF document.
    async fn export_pdf(&self) -> Result<Vec<u8>>;

    // ── Playback ────────────────────────────────────────────────────

    /// Play the next track and return it.
    async fn play(&self) -> Result<TrackRef>;

    async fn pause(&self) -> Result<()>;

    async fn new_round(&self) -> Result<()>;

    // ── Playlists and devices ───────────────────────────────────────

    async fn add_playlist(&self, playlist_id: &str, is_default: bool) -> Result<String>;

    async fn load_playlist(&self, playlist_id: &str) -> Result<String>;

    async fn select_device(&self, device_id: &str) -> Result<String>;

    // ── Saved games ─────────────────────────────────────────────────

    async fn save_game(&self, name: &str, description: &str) -> Result<String>;

    async fn list_saved_games(&self) -> Result<Vec<SavedGame>>;

    /// Restore a saved game by the file name from [`list_saved_games`](Self::list_saved_games).
    async fn load_game(&self, filename: &str) -> Result<String>;
}

// ── Request and response bodies ─────────────────────────────────────

/// Result of a single-card check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardCheck {
    /// Echo of the checked id; some backends omit it.
    #[serde(default)]
    pub card_id: Option<CardId>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub matches: Vec<u32>,
}

impl CardCheck {
    pub fn card_status(&self) -> CardStatus {
        CardStatus::from_wire(&self.status, !self.matches.is_empty())
    }
}

/// Body of a position check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub card_id: CardId,
    pub track_id: String,
    pub position: u8,
}

/// Answer to a position check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub has_bingo: bool,
}

/// Counters in the dashboard snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameStateSummary {
    #[serde(default)]
    pub num_tracks: usize,
    #[serde(default)]
    pub played_tracks: Tally,
    #[serde(default)]
    pub cards: Tally,
}

/// Dashboard snapshot endpoint body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default)]
    pub game_state: GameStateSummary,
    #[serde(default)]
    pub card_summaries: BTreeMap<CardId, String>,
}

impl DashboardData {
    pub fn to_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            track_count: self.game_state.num_tracks,
            played_count: self.game_state.played_tracks.count(),
            card_count: self.game_state.cards.count(),
            card_summaries: self
                .card_summaries
                .iter()
                .map(|(id, status)| (id.clone(), CardStatus::from_wire(status, false)))
                .collect(),
        }
    }
}

/// One entry of the saved-games listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGame {
    pub filename: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub description: String,
}

/// `{message}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// `{error}` body of a non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "message")]
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistsResponse {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayedTracksResponse {
    #[serde(default)]
    pub played_tracks: Vec<TrackRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardsResponse {
    #[serde(default)]
    pub cards: BTreeMap<CardId, CardPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayResponse {
    pub track: TrackRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SavedGamesResponse {
    #[serde(default)]
    pub saved_games: Vec<SavedGame>,
}
