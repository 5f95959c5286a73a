#![no_main]

use bingo_dashboard_client::protocol::CardPayload;
use bingo_dashboard_client::CardId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Card payloads come from the backend verbatim; conversion must reject
    // bad grids and positions without panicking.
    if let Ok(payload) = serde_json::from_slice::<CardPayload>(data) {
        let _ = payload.status();
        let _ = payload.into_view(CardId::new("fuzz"));
    }
});
