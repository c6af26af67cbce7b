#![no_main]

use blackjack_client::protocol::parse;
use blackjack_client::state::{reduce, GameState};
use blackjack_client::transport::LineBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary chunks through the line reassembler, then every complete line
    // through the classifier and the reducer.
    let mut buffer = LineBuffer::new();
    let mut state = GameState::default();

    for chunk in data.chunks(7) {
        if buffer.extend(chunk).is_err() {
            return;
        }
        while let Some(line) = buffer.next_line() {
            state = reduce(&state, &parse(&line));
        }
    }

    // The str path on the whole input, including lines with the ready marker.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse(s);
    }
});
