//! [`DashboardApi`] over HTTP using `reqwest`.
//!
//! # Feature gate
//!
//! Only available with the `http-client` feature (enabled by default). Enable
//! `rustls-tls` for `https://` backends.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), bingo_dashboard_client::DashboardError> {
//! use bingo_dashboard_client::api::DashboardApi;
//! use bingo_dashboard_client::http::HttpApi;
//!
//! let api = HttpApi::new("http://localhost:5000");
//! for device in api.devices().await? {
//!     println!("{device}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::api::{
    CardCheck, CardsResponse, DashboardApi, DashboardData, DevicesResponse, ErrorBody,
    MessageResponse, PlayResponse, PlayedTracksResponse, PlaylistsResponse, PositionRequest,
    PositionValidation, SavedGame, SavedGamesResponse,
};
use crate::error::{DashboardError, Result};
use crate::model::{CardId, Device, GameStats, Playlist, TrackRef};
use crate::protocol::CardPayload;

/// `reqwest`-backed client for the dashboard backend.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    /// Create a client for the backend at `base_url` (e.g. `http://localhost:5000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Use a preconfigured `reqwest` client (cookies, proxies, timeouts).
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `path` followed by `segment` as one percent-encoded path segment.
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| DashboardError::InvalidInput(format!("invalid backend URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                DashboardError::InvalidInput(format!("{} cannot be a base URL", self.base_url))
            })?
            .push(segment);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json_at(self.url(path)).await
    }

    async fn get_json_at<T: DeserializeOwned>(&self, url: impl IntoUrl + fmt::Display) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(request_error)?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.post_json_at(self.url(path), body).await
    }

    async fn post_json_at<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: impl IntoUrl + fmt::Display,
        body: &B,
    ) -> Result<T> {
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        decode(response).await
    }

    async fn post_message<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String> {
        let response: MessageResponse = self.post_json(path, body).await?;
        Ok(response.message)
    }
}

fn request_error(err: reqwest::Error) -> DashboardError {
    DashboardError::Request(err.to_string())
}

/// Turn a non-success status into an error carrying the body's `error` text.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .map(|body| body.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(DashboardError::from_server(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await.map_err(request_error)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn playlists(&self) -> Result<Vec<Playlist>> {
        let body: PlaylistsResponse = self.get_json("/playlist/api/get_playlists").await?;
        Ok(body.playlists)
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let body: DevicesResponse = self.get_json("/device/api/get_devices").await?;
        Ok(body.devices)
    }

    async fn played_tracks(&self) -> Result<Vec<TrackRef>> {
        let body: PlayedTracksResponse = self.get_json("/playback/api/played_tracks").await?;
        Ok(body.played_tracks)
    }

    async fn cards(&self) -> Result<BTreeMap<CardId, CardPayload>> {
        let body: CardsResponse = self.get_json("/card/api/get_cards").await?;
        Ok(body.cards)
    }

    async fn check_card(&self, card_id: &CardId) -> Result<CardCheck> {
        let url = self.url_with_segment("/card/api/check_card", card_id.as_str())?;
        self.get_json_at(url).await
    }

    async fn dashboard_data(&self) -> Result<DashboardData> {
        self.get_json("/dashboard/api/dashboard_data").await
    }

    async fn dashboard_stats(&self) -> Result<GameStats> {
        self.get_json("/dashboard/api/dashboard_stats").await
    }

    async fn validate_position(&self, request: &PositionRequest) -> Result<PositionValidation> {
        self.post_json("/card/api/validate_card", request).await
    }

    async fn generate_cards(&self, num_cards: u32) -> Result<String> {
        self.post_message("/card/api/generate_cards", &json!({ "num_cards": num_cards }))
            .await
    }

    async fn export_pdf(&self) -> Result<Vec<u8>> {
        debug!("GET pdf export");
        let response = self
            .client
            .get(self.url("/card/api/download_cards_pdf"))
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }

    async fn play(&self) -> Result<TrackRef> {
        let body: PlayResponse = self.post_json("/playback/api/play", &json!({})).await?;
        Ok(body.track)
    }

    async fn pause(&self) -> Result<()> {
        let _: serde_json::Value = self.post_json("/playback/api/pause", &json!({})).await?;
        Ok(())
    }

    async fn new_round(&self) -> Result<()> {
        let _: serde_json::Value = self.post_json("/game/api/new_round", &json!({})).await?;
        Ok(())
    }

    async fn add_playlist(&self, playlist_id: &str, is_default: bool) -> Result<String> {
        self.post_message(
            "/playlist/api/add_playlist",
            &json!({ "playlist_id": playlist_id, "is_default": is_default }),
        )
        .await
    }

    async fn load_playlist(&self, playlist_id: &str) -> Result<String> {
        self.post_message(
            "/playlist/api/load_playlist",
            &json!({ "playlist_id": playlist_id }),
        )
        .await
    }

    async fn select_device(&self, device_id: &str) -> Result<String> {
        self.post_message(
            "/device/api/select_device",
            &json!({ "device_id": device_id }),
        )
        .await
    }

    async fn save_game(&self, name: &str, description: &str) -> Result<String> {
        self.post_message(
            "/game_management/api/save_game",
            &json!({ "name": name, "description": description }),
        )
        .await
    }

    async fn list_saved_games(&self) -> Result<Vec<SavedGame>> {
        let body: SavedGamesResponse = self
            .get_json("/game_management/api/list_saved_games")
            .await?;
        Ok(body.saved_games)
    }

    async fn load_game(&self, filename: &str) -> Result<String> {
        let url = self.url_with_segment("/game_management/api/load_game", filename)?;
        let response: MessageResponse = self.post_json_at(url, &json!({})).await?;
        Ok(response.message)
    }
}
