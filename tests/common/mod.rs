#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the dashboard integration tests.
//!
//! - [`ScriptedConnector`] hands out channel-backed transports whose server
//!   side ([`Link`]) the test drives.
//! - [`MockApi`] is an in-memory backend with call counters, failure
//!   injection and a gate that holds card checks in flight.
//! - [`RecordingSink`] records every notification.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bingo_dashboard_client::api::{
    CardCheck, DashboardApi, DashboardData, GameStateSummary, PositionRequest, PositionValidation,
    SavedGame,
};
use bingo_dashboard_client::config::{ChannelConfig, DashboardConfig};
use bingo_dashboard_client::model::{CardId, Device, GameStats, Playlist, TrackRef};
use bingo_dashboard_client::notify::{Notification, NotificationSink, ToastLevel};
use bingo_dashboard_client::protocol::{CardPayload, Tally};
use bingo_dashboard_client::{ConnectionState, DashboardError, Transport};
use bingo_dashboard_client::transport::Connector;
use tokio::sync::{mpsc, watch};

// ── Push channel ────────────────────────────────────────────────────

/// A transport fed by a [`Link`]. Dropping the link closes it cleanly.
pub struct LinkedTransport {
    incoming: mpsc::UnboundedReceiver<Result<String, DashboardError>>,
    sent: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl Transport for LinkedTransport {
    async fn send(&mut self, message: String) -> Result<(), DashboardError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, DashboardError>> {
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<(), DashboardError> {
        self.incoming.close();
        Ok(())
    }
}

/// Server side of one accepted connection.
pub struct Link {
    tx: mpsc::UnboundedSender<Result<String, DashboardError>>,
}

impl Link {
    /// Push one raw JSON frame.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.tx.send(Ok(frame.into()));
    }

    /// Fail the transport with a receive error.
    pub fn fail(&self, reason: &str) {
        let _ = self.tx.send(Err(DashboardError::TransportReceive(reason.into())));
    }
}

enum Dial {
    Accept(LinkedTransport),
    Refuse,
}

/// Connector whose dial outcomes are scripted in order. Once the script is
/// exhausted every dial is refused.
#[derive(Default)]
pub struct ScriptedConnector {
    script: StdMutex<VecDeque<Dial>>,
    sent: Arc<StdMutex<Vec<String>>>,
    dials: StdMutex<usize>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an accepted connection and return its server side.
    pub fn accept(&self) -> Link {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Dial::Accept(LinkedTransport {
            incoming: rx,
            sent: Arc::clone(&self.sent),
        }));
        Link { tx }
    }

    /// Queue a refused connection.
    pub fn refuse(&self) {
        self.script.lock().unwrap().push_back(Dial::Refuse);
    }

    pub fn dials(&self) -> usize {
        *self.dials.lock().unwrap()
    }

    /// Every frame the client sent, over all connections.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DashboardError> {
        *self.dials.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Dial::Accept(transport)) => Ok(Box::new(transport)),
            Some(Dial::Refuse) | None => Err(DashboardError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
        }
    }
}

// ── Frames ──────────────────────────────────────────────────────────

pub fn new_track_frame(artist: &str, name: &str) -> String {
    serde_json::json!({
        "event": "new_track",
        "data": {"track": {"artist": artist, "name": name}}
    })
    .to_string()
}

pub fn card_status_frame(card_id: &str, status: &str, matches: &[u32]) -> String {
    serde_json::json!({
        "event": "card_status_update",
        "data": {"card_id": card_id, "status": status, "matches": matches}
    })
    .to_string()
}

pub fn game_state_frame(unplayed: usize, played: usize, card_ids: &[&str]) -> String {
    let cards: serde_json::Map<String, serde_json::Value> = card_ids
        .iter()
        .map(|id| {
            (
                id.to_string(),
                serde_json::json!({"tracks": track_list(25), "matches": [], "bingo_status": "Not checked"}),
            )
        })
        .collect();
    serde_json::json!({
        "event": "game_state",
        "data": {"unplayed_tracks": unplayed, "played_tracks": played, "cards": cards}
    })
    .to_string()
}

// ── Cards ───────────────────────────────────────────────────────────

pub fn tracks(n: usize) -> Vec<TrackRef> {
    (0..n)
        .map(|i| TrackRef {
            artist: format!("Artist {i}"),
            name: format!("Song {i}"),
            id: Some(format!("track-{i}")),
        })
        .collect()
}

pub fn track_list(n: usize) -> serde_json::Value {
    serde_json::to_value(tracks(n)).unwrap()
}

pub fn card_payload(status: &str, matches: &[u32]) -> CardPayload {
    CardPayload {
        tracks: tracks(25),
        matches: matches.to_vec(),
        bingo_status: Some(status.to_string()),
    }
}

pub fn card_id(i: usize) -> CardId {
    CardId::new(format!("C{i}"))
}

// ── Mock backend ────────────────────────────────────────────────────

/// Mutable contents of the mock backend.
#[derive(Default)]
pub struct Backend {
    pub cards: BTreeMap<CardId, CardPayload>,
    /// Answers for `check_card`; unknown ids answer "Not checked".
    pub checks: HashMap<CardId, CardCheck>,
    pub played: Vec<TrackRef>,
    pub stats: GameStats,
    pub dashboard: DashboardData,
    pub playlists: Vec<Playlist>,
    pub devices: Vec<Device>,
    pub saved_games: Vec<SavedGame>,
    pub position: PositionValidation,
    pub next_track: Option<TrackRef>,
    /// Card checks that fail.
    pub failing_cards: HashSet<CardId>,
    /// Endpoints that fail, with the error message they answer.
    pub failing_endpoints: HashMap<&'static str, String>,
}

/// In-memory [`DashboardApi`].
pub struct MockApi {
    pub backend: StdMutex<Backend>,
    calls: StdMutex<HashMap<&'static str, usize>>,
    checks_per_card: StdMutex<HashMap<CardId, usize>>,
    in_flight: StdMutex<HashMap<CardId, usize>>,
    max_in_flight_per_card: StdMutex<usize>,
    check_gate: watch::Sender<bool>,
}

impl Default for MockApi {
    fn default() -> Self {
        let (check_gate, _) = watch::channel(true);
        Self {
            backend: StdMutex::new(Backend::default()),
            calls: StdMutex::new(HashMap::new()),
            checks_per_card: StdMutex::new(HashMap::new()),
            in_flight: StdMutex::new(HashMap::new()),
            max_in_flight_per_card: StdMutex::new(0),
            check_gate,
        }
    }
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A backend holding `n` cards `C1..=Cn`, all unchecked.
    pub fn with_cards(n: usize) -> Arc<Self> {
        let api = Self::new();
        {
            let mut backend = api.backend.lock().unwrap();
            for i in 1..=n {
                backend.cards.insert(card_id(i), card_payload("Not checked", &[]));
            }
        }
        api
    }

    pub fn set_check(&self, id: &CardId, status: &str, matches: &[u32]) {
        self.backend.lock().unwrap().checks.insert(
            id.clone(),
            CardCheck {
                card_id: Some(id.clone()),
                status: status.to_string(),
                matches: matches.to_vec(),
            },
        );
    }

    pub fn fail_card(&self, id: &CardId) {
        self.backend.lock().unwrap().failing_cards.insert(id.clone());
    }

    pub fn fail_endpoint(&self, name: &'static str, message: &str) {
        self.backend
            .lock()
            .unwrap()
            .failing_endpoints
            .insert(name, message.to_string());
    }

    /// Hold every `check_card` call until [`open_checks`](Self::open_checks).
    pub fn hold_checks(&self) {
        self.check_gate.send_replace(false);
    }

    pub fn open_checks(&self) {
        self.check_gate.send_replace(true);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.checks_per_card.lock().unwrap().clear();
    }

    pub fn checks_for(&self, id: &CardId) -> usize {
        self.checks_per_card.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Highest number of concurrent checks observed for any single card.
    pub fn max_in_flight_per_card(&self) -> usize {
        *self.max_in_flight_per_card.lock().unwrap()
    }

    fn hit(&self, name: &'static str) -> Result<(), DashboardError> {
        *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
        match self.backend.lock().unwrap().failing_endpoints.get(name) {
            Some(message) => Err(DashboardError::from_server(500, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DashboardApi for MockApi {
    async fn playlists(&self) -> Result<Vec<Playlist>, DashboardError> {
        self.hit("playlists")?;
        Ok(self.backend.lock().unwrap().playlists.clone())
    }

    async fn devices(&self) -> Result<Vec<Device>, DashboardError> {
        self.hit("devices")?;
        Ok(self.backend.lock().unwrap().devices.clone())
    }

    async fn played_tracks(&self) -> Result<Vec<TrackRef>, DashboardError> {
        self.hit("played_tracks")?;
        Ok(self.backend.lock().unwrap().played.clone())
    }

    async fn cards(&self) -> Result<BTreeMap<CardId, CardPayload>, DashboardError> {
        self.hit("cards")?;
        Ok(self.backend.lock().unwrap().cards.clone())
    }

    async fn check_card(&self, card_id: &CardId) -> Result<CardCheck, DashboardError> {
        self.hit("check_card")?;
        *self
            .checks_per_card
            .lock()
            .unwrap()
            .entry(card_id.clone())
            .or_insert(0) += 1;
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let n = in_flight.entry(card_id.clone()).or_insert(0);
            *n += 1;
            let mut max = self.max_in_flight_per_card.lock().unwrap();
            *max = (*max).max(*n);
        }

        let mut gate = self.check_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        *self
            .in_flight
            .lock()
            .unwrap()
            .entry(card_id.clone())
            .or_insert(1) -= 1;

        let backend = self.backend.lock().unwrap();
        if backend.failing_cards.contains(card_id) {
            return Err(DashboardError::from_server(500, format!("check failed for {card_id}")));
        }
        Ok(backend.checks.get(card_id).cloned().unwrap_or(CardCheck {
            card_id: Some(card_id.clone()),
            status: "Not checked".into(),
            matches: vec![],
        }))
    }

    async fn dashboard_data(&self) -> Result<DashboardData, DashboardError> {
        self.hit("dashboard_data")?;
        Ok(self.backend.lock().unwrap().dashboard.clone())
    }

    async fn dashboard_stats(&self) -> Result<GameStats, DashboardError> {
        self.hit("dashboard_stats")?;
        Ok(self.backend.lock().unwrap().stats.clone())
    }

    async fn validate_position(
        &self,
        _request: &PositionRequest,
    ) -> Result<PositionValidation, DashboardError> {
        self.hit("validate_position")?;
        Ok(self.backend.lock().unwrap().position)
    }

    async fn generate_cards(&self, num_cards: u32) -> Result<String, DashboardError> {
        self.hit("generate_cards")?;
        let mut backend = self.backend.lock().unwrap();
        backend.cards.clear();
        for i in 1..=num_cards as usize {
            backend.cards.insert(card_id(i), card_payload("Not checked", &[]));
        }
        Ok(format!("Generated {num_cards} cards"))
    }

    async fn export_pdf(&self) -> Result<Vec<u8>, DashboardError> {
        self.hit("export_pdf")?;
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn play(&self) -> Result<TrackRef, DashboardError> {
        self.hit("play")?;
        let mut backend = self.backend.lock().unwrap();
        let track = backend
            .next_track
            .clone()
            .unwrap_or_else(|| TrackRef::new("Queen", "Bohemian Rhapsody"));
        backend.played.push(track.clone());
        Ok(track)
    }

    async fn pause(&self) -> Result<(), DashboardError> {
        self.hit("pause")
    }

    async fn new_round(&self) -> Result<(), DashboardError> {
        self.hit("new_round")?;
        let mut backend = self.backend.lock().unwrap();
        backend.played.clear();
        backend.checks.clear();
        Ok(())
    }

    async fn add_playlist(&self, playlist_id: &str, is_default: bool) -> Result<String, DashboardError> {
        self.hit("add_playlist")?;
        self.backend.lock().unwrap().playlists.push(Playlist {
            id: playlist_id.to_string(),
            name: format!("Playlist {playlist_id}"),
            is_default,
        });
        Ok("Playlist added".into())
    }

    async fn load_playlist(&self, playlist_id: &str) -> Result<String, DashboardError> {
        self.hit("load_playlist")?;
        Ok(format!("Loaded playlist {playlist_id}"))
    }

    async fn select_device(&self, device_id: &str) -> Result<String, DashboardError> {
        self.hit("select_device")?;
        for device in &mut self.backend.lock().unwrap().devices {
            device.is_active = device.id == device_id;
        }
        Ok("Device selected".into())
    }

    async fn save_game(&self, name: &str, description: &str) -> Result<String, DashboardError> {
        self.hit("save_game")?;
        self.backend.lock().unwrap().saved_games.push(SavedGame {
            filename: format!("{name}.json"),
            name: name.to_string(),
            timestamp: "2026-10-16T12:00:00".into(),
            description: description.to_string(),
        });
        Ok(format!("Game saved as {name}"))
    }

    async fn list_saved_games(&self) -> Result<Vec<SavedGame>, DashboardError> {
        self.hit("list_saved_games")?;
        Ok(self.backend.lock().unwrap().saved_games.clone())
    }

    async fn load_game(&self, filename: &str) -> Result<String, DashboardError> {
        self.hit("load_game")?;
        Ok(format!("Loaded {filename}"))
    }
}

/// Dashboard snapshot answer with the given counters.
pub fn dashboard_data(num_tracks: usize, played: usize, cards: usize) -> DashboardData {
    DashboardData {
        game_state: GameStateSummary {
            num_tracks,
            played_tracks: Tally::Count(played),
            cards: Tally::Count(cards),
        },
        card_summaries: BTreeMap::new(),
    }
}

// ── Notifications ───────────────────────────────────────────────────

/// Records every notification.
#[derive(Default)]
pub struct RecordingSink {
    notes: StdMutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }

    pub fn toasts(&self) -> Vec<(ToastLevel, String)> {
        self.all()
            .iter()
            .filter_map(|n| Some((n.level()?, n.message()?.to_string())))
            .collect()
    }

    pub fn count_exact(&self, message: &str) -> usize {
        self.toasts().iter().filter(|(_, m)| m == message).count()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.toasts().iter().filter(|(_, m)| m.contains(needle)).count()
    }

    pub fn errors(&self) -> Vec<String> {
        self.toasts()
            .into_iter()
            .filter(|(level, _)| *level == ToastLevel::Error)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn login_redirects(&self) -> usize {
        self.all()
            .iter()
            .filter(|n| matches!(n, Notification::LoginRequired { .. }))
            .count()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.all()
            .iter()
            .filter_map(|n| match n {
                Notification::ConnectionStatus(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.notes.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

// ── Scheduling helpers ──────────────────────────────────────────────

/// Let every runnable task make progress without advancing the clock.
pub async fn settle() {
    for _ in 0..2_000 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `check` holds, without advancing the clock.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..20_000 {
        if check() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    check()
}

/// A session config with timers far enough out not to interfere unless a
/// test advances the clock on purpose.
pub fn test_config() -> DashboardConfig {
    DashboardConfig::new("http://bingo.test", "ws://bingo.test/events")
        .with_channel(
            ChannelConfig::default()
                .with_retry_delay(Duration::from_millis(1000), Duration::from_millis(5000)),
        )
        .with_initial_connect_grace(Duration::from_secs(5))
        .with_fallback_poll_interval(Duration::from_secs(30))
}
