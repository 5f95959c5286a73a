//! # Loopback Dashboard Example
//!
//! Drives a [`DashboardSession`] without any backend: the push channel is an
//! in-process [`Transport`] and the HTTP side is an in-memory
//! [`DashboardApi`]. Useful as a template for testing UI code against the
//! sync core.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_dashboard
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bingo_dashboard_client::api::{
    CardCheck, DashboardData, PositionRequest, PositionValidation, SavedGame,
};
use bingo_dashboard_client::model::{Device, GameStats, Playlist};
use bingo_dashboard_client::protocol::CardPayload;
use bingo_dashboard_client::{
    CardId, ChannelSink, Connector, DashboardApi, DashboardConfig, DashboardError,
    DashboardSession, Notification, TrackRef, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: An in-process push channel
// ─────────────────────────────────────────────────────────────────────

/// Client half of the loopback channel.
struct LoopbackTransport {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), DashboardError> {
        tracing::info!("dashboard -> backend: {message}");
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, DashboardError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), DashboardError> {
        self.rx.close();
        Ok(())
    }
}

/// Hands out the single loopback transport; later dials fail.
struct LoopbackConnector {
    transport: StdMutex<Option<LoopbackTransport>>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DashboardError> {
        let transport = self
            .transport
            .lock()
            .map_err(|_| DashboardError::TransportClosed)?
            .take()
            .ok_or(DashboardError::TransportClosed)?;
        Ok(Box::new(transport))
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: An in-memory backend
// ─────────────────────────────────────────────────────────────────────

fn tracks() -> Vec<TrackRef> {
    (0..25)
        .map(|i| TrackRef::new(format!("Artist {i}"), format!("Song {i}")))
        .collect()
}

#[derive(Default)]
struct MemoryBackend {
    cards: StdMutex<BTreeMap<CardId, CardPayload>>,
    played: StdMutex<Vec<TrackRef>>,
}

impl MemoryBackend {
    fn stored_cards(&self) -> Result<BTreeMap<CardId, CardPayload>, DashboardError> {
        self.cards
            .lock()
            .map(|cards| cards.clone())
            .map_err(|_| DashboardError::TaskFailed("backend lock poisoned".into()))
    }
}

#[async_trait]
impl DashboardApi for MemoryBackend {
    async fn playlists(&self) -> Result<Vec<Playlist>, DashboardError> {
        Ok(vec![Playlist {
            id: "demo".into(),
            name: "Demo hits".into(),
            is_default: true,
        }])
    }

    async fn devices(&self) -> Result<Vec<Device>, DashboardError> {
        Ok(vec![])
    }

    async fn played_tracks(&self) -> Result<Vec<TrackRef>, DashboardError> {
        self.played
            .lock()
            .map(|played| played.clone())
            .map_err(|_| DashboardError::TaskFailed("backend lock poisoned".into()))
    }

    async fn cards(&self) -> Result<BTreeMap<CardId, CardPayload>, DashboardError> {
        self.stored_cards()
    }

    async fn check_card(&self, card_id: &CardId) -> Result<CardCheck, DashboardError> {
        let payload = self.stored_cards()?.remove(card_id).unwrap_or_default();
        Ok(CardCheck {
            card_id: Some(card_id.clone()),
            status: payload.bingo_status.unwrap_or_else(|| "No bingo yet".into()),
            matches: payload.matches,
        })
    }

    async fn dashboard_data(&self) -> Result<DashboardData, DashboardError> {
        Ok(DashboardData::default())
    }

    async fn dashboard_stats(&self) -> Result<GameStats, DashboardError> {
        Ok(GameStats::default())
    }

    async fn validate_position(
        &self,
        _request: &PositionRequest,
    ) -> Result<PositionValidation, DashboardError> {
        Ok(PositionValidation::default())
    }

    async fn generate_cards(&self, num_cards: u32) -> Result<String, DashboardError> {
        let mut cards = self
            .cards
            .lock()
            .map_err(|_| DashboardError::TaskFailed("backend lock poisoned".into()))?;
        for i in 1..=num_cards {
            cards.insert(
                CardId::new(i.to_string()),
                CardPayload {
                    tracks: tracks(),
                    matches: vec![],
                    bingo_status: None,
                },
            );
        }
        Ok(format!("Generated {num_cards} cards"))
    }

    async fn export_pdf(&self) -> Result<Vec<u8>, DashboardError> {
        Ok(Vec::new())
    }

    async fn play(&self) -> Result<TrackRef, DashboardError> {
        Ok(TrackRef::new("Queen", "Bohemian Rhapsody"))
    }

    async fn pause(&self) -> Result<(), DashboardError> {
        Ok(())
    }

    async fn new_round(&self) -> Result<(), DashboardError> {
        Ok(())
    }

    async fn add_playlist(&self, _playlist_id: &str, _is_default: bool) -> Result<String, DashboardError> {
        Ok("Playlist added".into())
    }

    async fn load_playlist(&self, _playlist_id: &str) -> Result<String, DashboardError> {
        Ok("Playlist loaded".into())
    }

    async fn select_device(&self, _device_id: &str) -> Result<String, DashboardError> {
        Ok("Device selected".into())
    }

    async fn save_game(&self, name: &str, _description: &str) -> Result<String, DashboardError> {
        Ok(format!("Game saved as {name}"))
    }

    async fn list_saved_games(&self) -> Result<Vec<SavedGame>, DashboardError> {
        Ok(vec![])
    }

    async fn load_game(&self, filename: &str) -> Result<String, DashboardError> {
        Ok(format!("Loaded {filename}"))
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Drive a session
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (server_tx, client_rx) = mpsc::unbounded_channel();
    let connector = Arc::new(LoopbackConnector {
        transport: StdMutex::new(Some(LoopbackTransport { rx: client_rx })),
    });
    let backend = Arc::new(MemoryBackend::default());
    let (sink, mut notifications) = ChannelSink::new();

    let config = DashboardConfig::new("http://loopback", "ws://loopback/events");
    let session = DashboardSession::new(config, connector, backend.clone(), Arc::new(sink));
    session.start().await;

    session.generate_cards(4).await?;

    // The backend decides card 2 has won and pushes it.
    if let Ok(mut cards) = backend.cards.lock() {
        if let Some(card) = cards.get_mut(&CardId::new("2")) {
            card.matches = vec![0, 1, 2, 3, 4];
            card.bingo_status = Some("BINGO!".into());
        }
    }
    server_tx.send(
        r#"{"event":"new_track","data":{"track":{"artist":"Queen","name":"Bohemian Rhapsody"}}}"#
            .to_string(),
    )?;
    server_tx.send(
        r#"{"event":"card_status_update","data":{"card_id":"2","status":"BINGO!","matches":[0,1,2,3,4]}}"#
            .to_string(),
    )?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    session.shutdown().await;

    while let Ok(note) = notifications.try_recv() {
        if let Notification::Toast(toast) = note {
            println!("[{:?}] {}", toast.level, toast.message);
        }
    }
    for card in session.cards().await {
        println!("card {}: {} ({} matches)", card.id, card.bingo_status, card.match_count());
    }
    Ok(())
}
