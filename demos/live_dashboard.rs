//! # Live Dashboard Example
//!
//! Runs a dashboard session against a real backend:
//!
//! 1. Connect the push channel over WebSocket
//! 2. Load playlists, devices, cards and stats over HTTP
//! 3. Print every notification the session raises
//! 4. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the bingo backend on localhost:5000, then:
//! cargo run --example live_dashboard
//!
//! # Point at another backend:
//! BINGO_DASHBOARD_URL=http://bingo.local:8080 cargo run --example live_dashboard
//! ```

use std::sync::Arc;

use bingo_dashboard_client::{
    ChannelSink, DashboardConfig, DashboardSession, HttpApi, Notification, WebSocketConnector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = DashboardConfig::from_env();
    tracing::info!(
        "Dashboard backend {} (push channel {})",
        config.base_url,
        config.channel_url
    );

    let connector = Arc::new(WebSocketConnector::new(config.channel_url.clone()));
    let api = Arc::new(HttpApi::new(config.base_url.clone()));
    let (sink, mut notifications) = ChannelSink::new();

    // ── Start ───────────────────────────────────────────────────────
    let session = DashboardSession::new(config, connector, api, Arc::new(sink));
    session.start().await;

    // ── Notification loop ───────────────────────────────────────────
    loop {
        tokio::select! {
            note = notifications.recv() => {
                let Some(note) = note else {
                    tracing::info!("Notification channel closed, exiting");
                    break;
                };

                match note {
                    Notification::Toast(toast) => {
                        println!("[{:?}] {}", toast.level, toast.message);
                    }
                    Notification::ConnectionStatus(state) => {
                        println!("push channel: {state}");
                    }
                    Notification::LoginRequired { reason } => {
                        println!("login required: {reason}");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    let view = session.view().await;
    tracing::info!(
        "{} cards, {} tracks played",
        session.cards().await.len(),
        view.played_tracks.len()
    );
    session.shutdown().await;
    Ok(())
}
