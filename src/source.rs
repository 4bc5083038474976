// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event source integration trait.
//!
//! The event store is the authoritative, append-only log. The replay job
//! only ever asks it to resume after an offset; it never asks the store for
//! its own notion of "latest".
//!
//! # Example
//!
//! ```rust,no_run
//! use event_replay::source::EventSource;
//! use event_replay::{Event, EventStream, Offset};
//! use futures::stream::{self, StreamExt};
//!
//! struct FixedLog(Vec<Event>);
//!
//! impl EventSource for FixedLog {
//!     fn read(&self, after: Offset) -> EventStream<'_> {
//!         let events: Vec<_> = self.0.iter()
//!             .filter(|e| e.offset() > after)
//!             .cloned()
//!             .map(Ok)
//!             .collect();
//!         stream::iter(events).boxed()
//!     }
//! }
//! ```

use crate::event::EventStream;
use crate::offset::Offset;
use std::sync::Arc;

/// Trait defining what the replay job needs from the event store.
pub trait EventSource: Send + Sync + 'static {
    /// Read every event with an offset strictly greater than `after`.
    ///
    /// The returned stream is lazy and in source order. It may keep yielding
    /// as new events are appended upstream. A fault at any point, including
    /// while opening the read, is yielded as an `Err` item; the job stops
    /// consuming the stream after the first error.
    ///
    /// Ending the stream without an error means "closed or drained"; the job
    /// responds by starting a new cycle immediately.
    fn read(&self, after: Offset) -> EventStream<'_>;
}

impl<T: EventSource> EventSource for Arc<T> {
    fn read(&self, after: Offset) -> EventStream<'_> {
        (**self).read(after)
    }
}
