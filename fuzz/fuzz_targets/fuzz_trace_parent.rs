//! Fuzz target for trace context extraction.
//!
//! The traceparent header is copied from upstream events verbatim, so the
//! id accessors must cope with anything.

#![no_main]

use event_replay::event::FHIR_JSON;
use event_replay::{Event, EventMeta, Offset};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let event = Event::new(Offset::new(1), Vec::new()).with_meta(EventMeta {
        content_type: FHIR_JSON.to_string(),
        trace_parent: Some(data.to_string()),
    });

    // Should never panic, and ids never contain the separator
    if let Some(trace_id) = event.trace_id() {
        assert!(!trace_id.contains('-'));
    }
    if let Some(span_id) = event.parent_span_id() {
        assert!(!span_id.contains('-'));
    }
});
