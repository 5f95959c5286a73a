#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for [`DashboardSession`] over a scripted push channel
//! and an in-memory backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bingo_dashboard_client::api::PositionValidation;
use bingo_dashboard_client::config::{ChannelConfig, DashboardConfig};
use bingo_dashboard_client::notify::ToastLevel;
use bingo_dashboard_client::transport::Connector;
use bingo_dashboard_client::{
    CardStatus, ConnectionState, DashboardError, DashboardSession, PushEvent, ServerEvent,
    Transport,
};
use common::*;
use tokio_test::{assert_err, assert_ok};

fn session(
    config: DashboardConfig,
    connector: &Arc<ScriptedConnector>,
    api: &Arc<MockApi>,
    sink: &Arc<RecordingSink>,
) -> Arc<DashboardSession> {
    DashboardSession::new(config, connector.clone(), api.clone(), sink.clone())
}

fn event(frame: &str) -> PushEvent {
    PushEvent::from(serde_json::from_str::<ServerEvent>(frame).unwrap())
}

/// A push channel whose handshake never completes.
struct StalledConnector;

#[async_trait]
impl Connector for StalledConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, DashboardError> {
        std::future::pending().await
    }
}

// ── Push channel lifecycle ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn connect_requests_game_state_and_runs_full_resync() {
    let connector = ScriptedConnector::new();
    let _link = connector.accept();
    let api = MockApi::with_cards(3);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;

    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert!(!session.fallback_active().await);
    assert!(connector
        .sent()
        .iter()
        .any(|frame| frame.contains("request_game_state")));
    assert!(api.calls("playlists") >= 1);
    assert!(api.calls("devices") >= 1);
    assert_eq!(session.cards().await.len(), 3);
    assert_eq!(sink.states().last(), Some(&ConnectionState::Connected));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_starts_polling_and_reconnect_stops_it() {
    let connector = ScriptedConnector::new();
    let first = connector.accept();
    let _second = connector.accept();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;
    assert!(!session.fallback_active().await);

    drop(first);
    settle().await;
    assert_eq!(
        session.connection_state(),
        ConnectionState::Reconnecting { attempt: 1 }
    );
    assert!(session.fallback_active().await);
    assert_eq!(
        session.fallback_task().await.map(|t| t.interval),
        Some(Duration::from_secs(30))
    );
    assert_eq!(sink.count_exact("Reconnecting (attempt 1)..."), 1);

    api.reset_calls();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    settle().await;

    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert!(!session.fallback_active().await);
    assert_eq!(connector.dials(), 2);
    // One full resync on reconnect.
    assert_eq!(api.calls("playlists"), 1);
    assert_eq!(api.calls("devices"), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fallback_tracks_connection_state() {
    let connector = ScriptedConnector::new();
    connector.refuse();
    let _link = connector.accept();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;
    assert!(!session.connection_state().is_connected());
    assert!(session.fallback_active().await);
    assert_eq!(sink.count_containing("Connection error"), 1);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    settle().await;
    assert!(session.connection_state().is_connected());
    assert!(!session.fallback_active().await);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_notify_and_keep_polling() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let config = test_config().with_channel(
        ChannelConfig::default()
            .with_max_attempts(1)
            .with_retry_delay(Duration::from_millis(1000), Duration::from_millis(5000)),
    );
    let session = session(config, &connector, &api, &sink);

    session.start().await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    settle().await;

    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(connector.dials(), 2);
    assert_eq!(sink.count_containing("Lost connection to the server"), 1);
    assert!(session.fallback_active().await);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn grace_period_starts_polling_when_first_connect_stalls() {
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = DashboardSession::new(
        test_config(),
        Arc::new(StalledConnector),
        api.clone(),
        sink.clone(),
    );

    session.start().await;
    settle().await;
    assert_eq!(session.connection_state(), ConnectionState::Connecting);
    assert!(!session.fallback_active().await);

    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;
    assert!(!session.fallback_active().await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(session.fallback_active().await);

    // First poll lands one interval after the grace period ends.
    api.reset_calls();
    tokio::time::sleep(Duration::from_secs(31)).await;
    settle().await;
    assert_eq!(api.calls("playlists"), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_disconnects_without_starting_fallback() {
    let connector = ScriptedConnector::new();
    let _link = connector.accept();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;
    session.shutdown().await;
    settle().await;

    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(!session.fallback_active().await);
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_a_no_op() {
    let connector = ScriptedConnector::new();
    let _link = connector.accept();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    session.start().await;
    settle().await;

    assert_eq!(connector.dials(), 1);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn steady_refresh_polls_playback_group_while_connected() {
    let connector = ScriptedConnector::new();
    let _link = connector.accept();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let config = test_config().with_steady_refresh_interval(Duration::from_secs(2));
    let session = session(config, &connector, &api, &sink);

    session.start().await;
    settle().await;
    assert!(session.steady_refresh_active().await);

    api.reset_calls();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    settle().await;

    assert_eq!(api.calls("played_tracks"), 1);
    assert_eq!(api.calls("playlists"), 0);

    session.shutdown().await;
    assert!(!session.steady_refresh_active().await);
}

// ── Server events ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn new_track_notifies_once_and_refreshes_playback_group() {
    let connector = ScriptedConnector::new();
    let link = connector.accept();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;
    api.reset_calls();
    sink.clear();

    link.push(new_track_frame("Queen", "Bohemian Rhapsody"));
    settle().await;

    assert_eq!(sink.count_exact("Now playing: Queen - Bohemian Rhapsody"), 1);
    assert_eq!(api.calls("played_tracks"), 1);
    assert_eq!(api.calls("cards"), 1);
    assert_eq!(api.calls("dashboard_data"), 1);
    assert_eq!(api.calls("playlists"), 0);
    assert_eq!(api.calls("devices"), 0);

    let view = session.view().await;
    assert_eq!(
        view.now_playing.map(|t| t.to_string()),
        Some("Queen - Bohemian Rhapsody".to_string())
    );

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_skipped_and_channel_stays_up() {
    let connector = ScriptedConnector::new();
    let link = connector.accept();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;

    link.push("{not json");
    link.push(new_track_frame("ABBA", "Waterloo"));
    settle().await;

    assert!(session.connection_state().is_connected());
    assert_eq!(sink.count_exact("Now playing: ABBA - Waterloo"), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn redelivered_bingo_notifies_once() {
    let connector = ScriptedConnector::new();
    let link = connector.accept();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;
    let c1 = card_id(1);
    assert_eq!(
        session.card(&c1).await.unwrap().bingo_status,
        CardStatus::NotChecked
    );

    {
        let mut backend = api.backend.lock().unwrap();
        backend
            .cards
            .insert(c1.clone(), card_payload("BINGO!", &[0, 1, 2, 3, 4]));
    }
    api.set_check(&c1, "BINGO!", &[0, 1, 2, 3, 4]);

    link.push(card_status_frame("C1", "BINGO!", &[0, 1, 2, 3, 4]));
    settle().await;
    link.push(card_status_frame("C1", "BINGO!", &[0, 1, 2, 3, 4]));
    settle().await;

    assert_eq!(sink.count_exact("Card C1: BINGO!"), 1);
    assert_eq!(
        session.card(&c1).await.unwrap().bingo_status,
        CardStatus::Bingo
    );

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn card_status_update_patches_before_reload() {
    let connector = ScriptedConnector::new();
    let link = connector.accept();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session.start().await;
    settle().await;
    api.reset_calls();
    api.fail_endpoint("cards", "card store unavailable");

    link.push(card_status_frame("C1", "Row bingo", &[0, 1, 2, 3, 4]));
    settle().await;

    let card = session.card(&card_id(1)).await.unwrap();
    assert_eq!(card.bingo_status, CardStatus::RowBingo);
    assert_eq!(card.match_count(), 5);
    assert_eq!(
        session.card(&card_id(2)).await.unwrap().bingo_status,
        CardStatus::NotChecked
    );
    assert_eq!(api.calls("cards"), 1);

    session.shutdown().await;
}

#[tokio::test]
async fn identical_game_state_applied_twice_is_stable() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    let frame = game_state_frame(40, 10, &["C1", "C2", "C3"]);

    session.dispatch(event(&frame)).await;
    let first = session.snapshot().await;
    session.dispatch(event(&frame)).await;
    let second = session.snapshot().await;

    assert_eq!(first, second);
    assert_eq!(first.track_count, 40);
    assert_eq!(first.played_count, 10);
    assert_eq!(first.card_count, 3);
    assert_eq!(api.calls("cards"), 0);
}

#[tokio::test]
async fn server_error_event_is_reported_without_state_change() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    session
        .dispatch(event(r#"{"event":"error","data":{"message":"playlist missing"}}"#))
        .await;

    assert_eq!(sink.errors().len(), 1);
    assert!(sink.errors()[0].contains("playlist missing"));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

// ── Validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn bingo_check_on_unchecked_card_celebrates_once() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(3);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    session.reconciler().load_cards().await.unwrap();
    sink.clear();

    let c2 = card_id(2);
    api.set_check(&c2, "BINGO!", &[0, 1, 2, 3, 4]);

    let outcome = session.validate_card(&c2).await.unwrap();
    assert!(outcome.entered_bingo);
    assert_eq!(outcome.status, CardStatus::Bingo);
    assert_eq!(outcome.match_count, 5);

    let card = session.card(&c2).await.unwrap();
    assert_eq!(card.bingo_status, CardStatus::Bingo);
    assert_eq!(
        card.matched_positions.iter().copied().collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    assert_eq!(sink.count_exact("Card C2: BINGO!"), 1);

    let again = session.validate_card(&c2).await.unwrap();
    assert!(!again.entered_bingo);
    assert_eq!(sink.count_exact("Card C2: BINGO!"), 1);
}

#[tokio::test]
async fn overlapping_batches_share_one_request_per_card() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(5);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    session.reconciler().load_cards().await.unwrap();
    api.reset_calls();

    api.hold_checks();
    let c1 = card_id(1);
    let (a, b, single, ()) = tokio::join!(
        session.validate_all_cards(),
        session.validate_all_cards(),
        session.validate_card(&c1),
        async {
            settle().await;
            assert!(session.validator().in_flight(&c1).await);
            assert_eq!(session.validator().tickets().await.len(), 5);
            api.open_checks();
        }
    );

    assert_eq!(a.validated.len(), 5);
    assert_eq!(b.validated.len(), 5);
    assert_ok!(single);
    assert_eq!(api.max_in_flight_per_card(), 1);
    for i in 1..=5 {
        assert_eq!(api.checks_for(&card_id(i)), 1);
    }
    assert!(!session.validator().in_flight(&c1).await);
}

#[tokio::test]
async fn one_failing_card_does_not_stop_the_batch() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(20);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    session.reconciler().load_cards().await.unwrap();
    api.reset_calls();
    sink.clear();

    for i in 1..=20 {
        api.set_check(&card_id(i), "No bingo yet", &[0, 6]);
    }
    let c7 = card_id(7);
    api.fail_card(&c7);

    let report = session.validate_all_cards().await;

    assert_eq!(report.validated.len(), 19);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, c7);
    assert!(report.stats_refreshed);
    assert_eq!(api.calls("dashboard_stats"), 1);

    for card in session.cards().await {
        if card.id == c7 {
            assert_eq!(card.bingo_status, CardStatus::NotChecked);
        } else {
            assert_eq!(card.bingo_status, CardStatus::HasMatches);
            assert_eq!(card.match_count(), 2);
        }
    }
    assert_eq!(sink.count_containing("Failed to validate card C7"), 1);
}

#[tokio::test]
async fn stats_failure_after_batch_is_reported() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    session.reconciler().load_cards().await.ok();
    sink.clear();
    api.fail_endpoint("dashboard_stats", "stats unavailable");

    let report = session.validate_all_cards().await;

    assert_eq!(report.validated.len(), 2);
    assert!(!report.stats_refreshed);
    assert_eq!(sink.count_containing("Failed to update game stats"), 1);
}

#[tokio::test(start_paused = true)]
async fn valid_position_is_announced_to_other_dashboards() {
    let connector = ScriptedConnector::new();
    let _link = connector.accept();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    session.start().await;
    settle().await;
    sink.clear();

    api.backend.lock().unwrap().position = PositionValidation {
        valid: true,
        has_bingo: true,
    };
    let c1 = card_id(1);
    let verdict = session.validate_card_position(&c1, "track-3", 3).await.unwrap();
    settle().await;

    assert!(verdict.has_bingo);
    assert_eq!(sink.count_exact("BINGO! Card C1 has won!"), 1);
    assert!(connector
        .sent()
        .iter()
        .any(|frame| frame.contains("card_validated") && frame.contains("C1")));

    session.shutdown().await;
}

#[tokio::test]
async fn invalid_position_is_quiet_and_out_of_range_is_rejected() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    let c1 = card_id(1);

    let verdict = session.validate_card_position(&c1, "track-0", 0).await.unwrap();
    assert!(!verdict.valid);
    assert!(sink.toasts().is_empty());
    assert_eq!(api.calls("cards"), 0);

    let err = session
        .validate_card_position(&c1, "track-0", 25)
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(_)));
    assert_eq!(api.calls("validate_position"), 1);
}

// ── User actions ────────────────────────────────────────────────────

#[tokio::test]
async fn generated_cards_are_loaded_with_full_grids() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    let load = session.generate_cards(16).await.unwrap();

    assert_eq!(load.loaded, 16);
    assert!(load.skipped.is_empty());
    let cards = session.cards().await;
    assert_eq!(cards.len(), 16);
    assert!(cards.iter().all(|c| c.tracks.len() == 25));
    assert_eq!(sink.count_exact("Generated 16 cards"), 1);
}

#[tokio::test]
async fn generate_cards_rejects_bad_counts_before_calling_backend() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    let err = session.generate_cards(0).await.unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(_)));

    // 50 tracks allow two cards.
    session
        .dispatch(event(&game_state_frame(50, 0, &[])))
        .await;
    assert_eq!(session.max_cards().await, 2);
    let err = session.generate_cards(3).await.unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(_)));

    assert_eq!(api.calls("generate_cards"), 0);
    assert_eq!(sink.count_containing("Failed to generate cards"), 2);
}

#[tokio::test]
async fn malformed_card_is_skipped_and_the_rest_load() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(3);
    api.backend.lock().unwrap().cards.insert(
        card_id(2),
        bingo_dashboard_client::protocol::CardPayload {
            tracks: tracks(7),
            matches: vec![],
            bingo_status: None,
        },
    );
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    let load = session.reconciler().load_cards().await.unwrap();

    assert_eq!(load.loaded, 2);
    assert_eq!(load.skipped, vec![card_id(2)]);
    assert_eq!(sink.count_containing("Skipped card C2"), 1);
    assert!(session.card(&card_id(2)).await.is_none());
}

#[tokio::test]
async fn play_and_pause_update_now_playing_and_history() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    let track = session.play().await.unwrap();
    assert_eq!(track.to_string(), "Queen - Bohemian Rhapsody");
    assert_eq!(sink.count_exact("Playing: Queen - Bohemian Rhapsody"), 1);

    let view = session.view().await;
    assert_eq!(view.now_playing, Some(track.clone()));
    assert_eq!(view.played_tracks, vec![track]);

    assert_ok!(session.pause().await);
    assert_eq!(sink.count_exact("Playback paused"), 1);
}

#[tokio::test]
async fn new_round_clears_round_data_and_reloads_cards() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(2);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);
    session.play().await.unwrap();
    api.set_check(&card_id(1), "Row bingo", &[0, 1, 2, 3, 4]);
    session.validate_card(&card_id(1)).await.unwrap();

    let load = session.new_round().await.unwrap();

    assert_eq!(load.loaded, 2);
    let view = session.view().await;
    assert!(view.played_tracks.is_empty());
    assert_eq!(view.now_playing, None);
    assert!(session
        .cards()
        .await
        .iter()
        .all(|c| c.bingo_status == CardStatus::NotChecked && c.matched_positions.is_empty()));
    assert_eq!(sink.count_exact("New round started"), 1);
}

#[tokio::test]
async fn empty_playlist_id_is_rejected() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    let err = session.add_playlist("   ", false).await.unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(_)));
    assert_eq!(api.calls("add_playlist"), 0);
    assert_eq!(sink.count_containing("Please enter a playlist ID"), 1);

    assert_ok!(session.add_playlist("37i9dQ", true).await);
    assert_eq!(sink.count_exact("Playlist added successfully"), 1);
    let view = session.view().await;
    assert_eq!(view.playlists.len(), 1);
    assert!(view.playlists[0].is_default);
}

#[tokio::test]
async fn expired_music_login_redirects_instead_of_toasting() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    api.fail_endpoint("devices", "Spotify authentication required");
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    let err = session.refresh_devices().await.unwrap_err();

    assert!(err.is_auth_required());
    assert_eq!(sink.login_redirects(), 1);
    assert!(sink.errors().is_empty());
}

#[tokio::test]
async fn pdf_export_failure_shows_retry_message() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    assert_eq!(session.export_pdf().await.unwrap(), b"%PDF-1.4".to_vec());

    api.fail_endpoint("export_pdf", "renderer crashed");
    assert_err!(session.export_pdf().await);
    assert_eq!(
        sink.toasts(),
        vec![(
            ToastLevel::Error,
            "Failed to download the PDF. Please try again.".to_string()
        )]
    );
}

#[tokio::test]
async fn saved_games_round_trip_through_the_backend() {
    let connector = ScriptedConnector::new();
    let api = MockApi::with_cards(1);
    let sink = RecordingSink::new();
    let session = session(test_config(), &connector, &api, &sink);

    assert_err!(session.save_game("  ", "").await);
    assert_ok!(session.save_game("Friday", "office party").await);

    let games = session.list_saved_games().await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].filename, "Friday.json");

    api.reset_calls();
    assert_ok!(session.load_game("Friday.json").await);
    assert_eq!(sink.count_exact("Loaded Friday.json"), 1);
    assert_eq!(api.calls("playlists"), 1);
    assert_eq!(api.calls("cards"), 1);
}

#[tokio::test]
async fn toasts_carry_configured_lifetime() {
    let connector = ScriptedConnector::new();
    let api = MockApi::new();
    let sink = RecordingSink::new();
    let config = test_config().with_notification_ttl(Duration::from_secs(9));
    let session = session(config, &connector, &api, &sink);

    session.pause().await.unwrap();

    let notes = sink.all();
    assert_eq!(notes.len(), 1);
    match &notes[0] {
        bingo_dashboard_client::Notification::Toast(toast) => {
            assert_eq!(toast.expires_after, Duration::from_secs(9));
        }
        other => panic!("expected toast, got {other:?}"),
    }
}
