// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event records flowing from the event store to the message bus.
//!
//! The payload is opaque: the replay job forwards it byte-for-byte and never
//! inspects it. Metadata is carried alongside so the bus adapter can set
//! headers and so logs can be correlated with the upstream producer.

use crate::error::ReplayError;
use crate::offset::Offset;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Media type of FHIR resources serialized as JSON.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Live, ordered feed of events strictly after some offset.
///
/// A fault terminates the feed with an `Err` item.
pub type EventStream<'a> = BoxStream<'a, Result<Event, ReplayError>>;

/// Metadata attached to an event by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_parent: Option<String>,
}

impl Default for EventMeta {
    fn default() -> Self {
        Self {
            content_type: FHIR_JSON.to_string(),
            trace_parent: None,
        }
    }
}

/// An immutable record read from the event store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    offset: Offset,
    payload: Vec<u8>,
    meta: EventMeta,
}

impl Event {
    pub fn new(offset: Offset, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            payload: payload.into(),
            meta: EventMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: EventMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Position assigned by the source.
    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn meta(&self) -> &EventMeta {
        &self.meta
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Get the trace parent from metadata, if present.
    ///
    /// Format: W3C Trace Context (e.g., "00-traceid-spanid-flags")
    pub fn trace_parent(&self) -> Option<&str> {
        self.meta.trace_parent.as_deref()
    }

    /// Extract trace ID from trace_parent (second dash-separated field).
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_parent().and_then(|tp| tp.split('-').nth(1))
    }

    /// Extract span ID from trace_parent (third dash-separated field).
    pub fn parent_span_id(&self) -> Option<&str> {
        self.trace_parent().and_then(|tp| tp.split('-').nth(2))
    }
}
