#![no_main]

use bingo_dashboard_client::{PushEvent, ServerEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's own UTF-8 validation.
    let _ = serde_json::from_slice::<ServerEvent>(data);

    // The path the push channel takes for text frames.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(event) = serde_json::from_str::<ServerEvent>(s) {
            if let ServerEvent::GameState(payload) = &event {
                let _ = payload.to_snapshot();
            }
            let _ = PushEvent::from(event).name();
        }
    }
});
