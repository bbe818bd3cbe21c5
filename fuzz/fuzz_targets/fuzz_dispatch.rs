#![no_main]

use libfuzzer_sys::fuzz_target;
use tournament_live::{LiveConfig, MessageDispatcher, NoHooks};

// Newline-separated frames applied in order; the state machine must never
// panic and the timeseries must stay inside its window.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let config = LiveConfig::new("http://localhost/api").with_timeseries_window(8);
    let mut dispatcher = MessageDispatcher::new(&config, Box::new(NoHooks));
    for frame in text.lines() {
        dispatcher.handle_frame(frame);
        assert!(dispatcher.timeseries().len() <= 8);
    }
});
