//! Fuzz target for offset parsing.
//!
//! Offsets arrive as text from bus metadata and environment variables.
//! Parsing must never panic, and anything it accepts must print back to
//! the same numeric value.

#![no_main]

use event_replay::Offset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(offset) = data.parse::<Offset>() else {
        return;
    };

    let printed = offset.to_string();
    assert_eq!(printed.parse::<Offset>().ok(), Some(offset));

    // Successor never panics, even at the end of the range
    let next = offset.next();
    assert!(next >= offset);
    assert!(next.value() - offset.value() <= 1);
});
