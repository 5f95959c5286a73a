//! Wire types for the push channel.
//!
//! Every push-channel message is a single JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`. Unit signals omit `data`.
//!
//! - [`ServerEvent`]: events pushed by the backend
//! - [`ClientSignal`]: signals the dashboard sends back
//!
//! Payload structs are lenient: missing collections default to empty so a
//! partially populated state dump still applies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{matched_positions, CardId, CardStatus, CardView, GameSnapshot, TrackRef};

// ── Shared payload pieces ───────────────────────────────────────────

/// A counter the backend sends either as a number or as the collection
/// being counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tally {
    Count(usize),
    List(Vec<serde_json::Value>),
    Map(serde_json::Map<String, serde_json::Value>),
}

impl Tally {
    pub fn count(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            Self::List(items) => items.len(),
            Self::Map(entries) => entries.len(),
        }
    }
}

impl Default for Tally {
    fn default() -> Self {
        Self::Count(0)
    }
}

/// One card as stored by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardPayload {
    #[serde(default)]
    pub tracks: Vec<TrackRef>,
    #[serde(default)]
    pub matches: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bingo_status: Option<String>,
}

impl CardPayload {
    /// Status implied by this payload.
    pub fn status(&self) -> CardStatus {
        CardStatus::from_wire(
            self.bingo_status.as_deref().unwrap_or("Not checked"),
            !self.matches.is_empty(),
        )
    }

    /// Convert into a [`CardView`], validating the slot count.
    pub fn into_view(self, id: CardId) -> Result<CardView> {
        let status = self.status();
        let matched = matched_positions(&id, &self.matches);
        CardView::new(id, self.tracks, matched, status)
    }
}

// ── Server events ───────────────────────────────────────────────────

/// Full game state pushed by the backend (answer to `request_game_state`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameStatePayload {
    #[serde(default)]
    pub unplayed_tracks: Tally,
    #[serde(default)]
    pub played_tracks: Tally,
    #[serde(default)]
    pub cards: BTreeMap<CardId, CardPayload>,
}

impl GameStatePayload {
    /// Derive the snapshot counters and per-card summaries.
    pub fn to_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            track_count: self.unplayed_tracks.count(),
            played_count: self.played_tracks.count(),
            card_count: self.cards.len(),
            card_summaries: self
                .cards
                .iter()
                .map(|(id, card)| (id.clone(), card.status()))
                .collect(),
        }
    }
}

/// Playback advanced to a new track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrackPayload {
    pub track: TrackRef,
}

/// The backend re-evaluated one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStatusPayload {
    pub card_id: CardId,
    pub status: String,
    #[serde(default)]
    pub matches: Vec<u32>,
}

/// Error reported by the backend over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(alias = "error")]
    pub message: String,
}

/// Events pushed from the backend to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Complete game state; self-sufficient, applied without a re-fetch.
    GameState(Box<GameStatePayload>),
    /// A new track started playing.
    NewTrack(NewTrackPayload),
    /// One card's status changed.
    CardStatusUpdate(CardStatusPayload),
    /// Backend-side error.
    Error(ErrorPayload),
    /// Connection acknowledgement sent by the backend on connect.
    ConnectionStatus { status: String },
}

// ── Client signals ──────────────────────────────────────────────────

/// Signals sent from the dashboard to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientSignal {
    /// Ask the backend to push a full `game_state`.
    RequestGameState,
    /// Tell the backend (and other dashboards) that a card was validated.
    CardValidated { card_id: CardId },
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_game_state_has_no_data() {
        let json = serde_json::to_value(&ClientSignal::RequestGameState).unwrap();
        assert_eq!(json, json!({ "event": "request_game_state" }));
    }

    #[test]
    fn card_validated_wire_shape() {
        let json = serde_json::to_value(&ClientSignal::CardValidated {
            card_id: CardId::from("ab12cd34"),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({ "event": "card_validated", "data": { "card_id": "ab12cd34" } })
        );
    }

    #[test]
    fn error_event_accepts_error_key() {
        let event: ServerEvent =
            serde_json::from_value(json!({ "event": "error", "data": { "error": "No card ID provided" } }))
                .unwrap();
        assert_eq!(
            event,
            ServerEvent::Error(ErrorPayload {
                message: "No card ID provided".into()
            })
        );
    }

    #[test]
    fn game_state_snapshot_counts_collections() {
        let event: ServerEvent = serde_json::from_value(json!({
            "event": "game_state",
            "data": {
                "unplayed_tracks": [{ "artist": "A", "name": "1" }, { "artist": "B", "name": "2" }],
                "played_tracks": [{ "artist": "C", "name": "3" }],
                "cards": {
                    "c1": { "tracks": [], "matches": [0, 1, 2, 3, 4], "bingo_status": "BINGO!" },
                    "c2": { "tracks": [], "bingo_status": "Not checked" }
                },
                "num_tracks": 2
            }
        }))
        .unwrap();
        let ServerEvent::GameState(payload) = event else {
            panic!("expected game_state");
        };
        let snapshot = payload.to_snapshot();
        assert_eq!(snapshot.track_count, 2);
        assert_eq!(snapshot.played_count, 1);
        assert_eq!(snapshot.card_count, 2);
        assert_eq!(snapshot.card_summaries[&CardId::from("c1")], CardStatus::Bingo);
        assert_eq!(snapshot.card_summaries[&CardId::from("c2")], CardStatus::NotChecked);
    }

    #[test]
    fn tally_accepts_numbers_and_collections() {
        let n: Tally = serde_json::from_value(json!(7)).unwrap();
        let list: Tally = serde_json::from_value(json!([1, 2])).unwrap();
        let map: Tally = serde_json::from_value(json!({ "a": 1 })).unwrap();
        assert_eq!((n.count(), list.count(), map.count()), (7, 2, 1));
    }
}
