//! Client-side data model: cards, tracks, statuses and aggregate counters.
//!
//! These types are the local projection of server state. They are derived
//! from the wire payloads in [`crate::api`] and [`crate::protocol`] and are the
//! single source of truth for anything rendered by the dashboard.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DashboardError, Result};

/// Number of track slots on a bingo card (5×5).
pub const CARD_SLOTS: usize = 25;

/// Number of tracks needed per generated card.
pub const TRACKS_PER_CARD: usize = CARD_SLOTS;

// ── Identifiers ─────────────────────────────────────────────────────

/// Server-assigned card identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Wrap a raw card id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Tracks ──────────────────────────────────────────────────────────

/// A reference to a playlist track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub artist: String,
    pub name: String,
    /// Streaming-service track id, present on full state dumps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl TrackRef {
    pub fn new(artist: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            name: name.into(),
            id: None,
        }
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)
    }
}

// ── Card status ─────────────────────────────────────────────────────

/// Bingo status of a single card, as understood by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CardStatus {
    #[default]
    NotChecked,
    HasMatches,
    RowBingo,
    ColumnBingo,
    Bingo,
}

impl CardStatus {
    /// Interpret a server status string together with the card's matches.
    ///
    /// The server uses several free-form strings ("BINGO!", "Row bingo",
    /// "No bingo yet", "No results", ...). Anything that is not a recognized
    /// bingo falls back to [`HasMatches`](Self::HasMatches) or
    /// [`NotChecked`](Self::NotChecked) depending on whether positions matched.
    pub fn from_wire(status: &str, has_matches: bool) -> Self {
        match status.trim() {
            "BINGO!" | "Full card bingo" => Self::Bingo,
            "Row bingo" => Self::RowBingo,
            "Column bingo" => Self::ColumnBingo,
            _ if has_matches => Self::HasMatches,
            _ => Self::NotChecked,
        }
    }

    /// UI significance, least to most significant. Row and column bingos rank
    /// equally.
    pub fn significance(self) -> u8 {
        match self {
            Self::NotChecked => 0,
            Self::HasMatches => 1,
            Self::RowBingo | Self::ColumnBingo => 2,
            Self::Bingo => 3,
        }
    }

    /// Returns `true` for the terminal winning status.
    pub fn is_bingo(self) -> bool {
        self == Self::Bingo
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::NotChecked => "Not checked",
            Self::HasMatches => "Has matches",
            Self::RowBingo => "Row bingo",
            Self::ColumnBingo => "Column bingo",
            Self::Bingo => "BINGO!",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Keep only valid card positions (`0..25`), warning about the rest.
pub fn matched_positions(card_id: &CardId, raw: &[u32]) -> BTreeSet<u8> {
    raw.iter()
        .filter_map(|&pos| match u8::try_from(pos) {
            Ok(p) if usize::from(p) < CARD_SLOTS => Some(p),
            _ => {
                warn!(card_id = %card_id, position = pos, "discarding out-of-range match position");
                None
            }
        })
        .collect()
}

// ── Card view ───────────────────────────────────────────────────────

/// The dashboard's view of one bingo card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub id: CardId,
    /// Exactly [`CARD_SLOTS`] tracks in row-major order.
    pub tracks: Vec<TrackRef>,
    pub matched_positions: BTreeSet<u8>,
    pub bingo_status: CardStatus,
}

impl CardView {
    /// Build a card view, rejecting cards that do not have 25 slots.
    pub fn new(
        id: CardId,
        tracks: Vec<TrackRef>,
        matched_positions: BTreeSet<u8>,
        bingo_status: CardStatus,
    ) -> Result<Self> {
        if tracks.len() != CARD_SLOTS {
            return Err(DashboardError::Protocol(format!(
                "card {id} has {} track slots, expected {CARD_SLOTS}",
                tracks.len()
            )));
        }
        Ok(Self {
            id,
            tracks,
            matched_positions,
            bingo_status,
        })
    }

    /// Number of matched positions.
    pub fn match_count(&self) -> usize {
        self.matched_positions.len()
    }

    /// Track at `position`, if in range.
    pub fn track_at(&self, position: u8) -> Option<&TrackRef> {
        self.tracks.get(usize::from(position))
    }
}

/// Result of patching a card's status in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: CardStatus,
    pub current: CardStatus,
}

impl StatusChange {
    /// `true` when the card moved into `Bingo` from any other status.
    pub fn entered_bingo(&self) -> bool {
        !self.previous.is_bingo() && self.current.is_bingo()
    }
}

// ── Aggregates ──────────────────────────────────────────────────────

/// Aggregate game counters, replaced wholesale on each refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameSnapshot {
    pub track_count: usize,
    pub played_count: usize,
    pub card_count: usize,
    pub card_summaries: BTreeMap<CardId, CardStatus>,
}

/// Aggregate statistics from the dashboard stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStats {
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub played_tracks: u32,
    #[serde(default)]
    pub remaining_tracks: u32,
    #[serde(default)]
    pub cards_with_matches: u32,
    #[serde(default)]
    pub bingos: u32,
}

/// A playlist the backend knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// A playback device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.is_active {
            f.write_str(" (active)")?;
        }
        if self.is_restricted {
            f.write_str(" [restricted]")?;
        }
        Ok(())
    }
}

/// Maximum number of cards that can be generated from `track_count` tracks.
pub fn max_cards(track_count: usize) -> usize {
    track_count / TRACKS_PER_CARD
}
