// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process event store and message bus.
//!
//! Reference adapters for local development, wiring tests and demos. Both
//! honour the full source/sink contracts:
//!
//! - [`InMemoryEventStore`] is an append-only log whose reads are *live*:
//!   after yielding the stored events they wait for new appends, and they
//!   end cleanly once the store is closed.
//! - [`InMemoryMessageBus`] records published events and reports the offset
//!   of the last one it accepted.
//!
//! Both support fault injection so the replay job's recovery path can be
//! exercised without a real broker.

use crate::error::{ReplayError, Result};
use crate::event::{Event, EventMeta, EventStream};
use crate::offset::Offset;
use crate::sink::{BoxFuture, EventSink};
use crate::source::EventSource;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{watch, RwLock};
use tracing::{debug, trace};

/// Head of the log as seen by live readers.
#[derive(Debug, Clone, Copy, Default)]
struct LogHead {
    last: Offset,
    closed: bool,
}

/// A read fault armed for the next `read()` call.
#[derive(Debug, Clone)]
struct ReadFault {
    /// Events to yield before failing
    after_events: usize,
    message: String,
}

/// Append-only, in-memory event log.
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
    head_tx: watch::Sender<LogHead>,
    read_faults: RwLock<VecDeque<ReadFault>>,
    reads: RwLock<Vec<Offset>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        let (head_tx, _) = watch::channel(LogHead::default());
        Self {
            events: RwLock::new(Vec::new()),
            head_tx,
            read_faults: RwLock::new(VecDeque::new()),
            reads: RwLock::new(Vec::new()),
        }
    }

    /// Append a payload with default metadata; returns its assigned offset.
    pub async fn append(&self, payload: impl Into<Vec<u8>>) -> Result<Offset> {
        self.append_with_meta(payload, EventMeta::default()).await
    }

    /// Append a payload; returns its assigned offset.
    ///
    /// Fails with [`ReplayError::Source`] once the store is closed.
    pub async fn append_with_meta(&self, payload: impl Into<Vec<u8>>, meta: EventMeta) -> Result<Offset> {
        if self.is_closed() {
            return Err(ReplayError::source("append", "event store is closed"));
        }

        let offset = {
            let mut events = self.events.write().await;
            let offset = events.last().map_or(Offset::BEGINNING, Event::offset).next();
            events.push(Event::new(offset, payload).with_meta(meta));
            offset
        };

        // Publish the new head after the event is visible to readers
        self.head_tx.send_modify(|head| head.last = offset);
        trace!(offset = %offset, "Appended event");
        Ok(offset)
    }

    /// Close the store. Live reads drain what is stored, then end cleanly.
    pub fn close(&self) {
        self.head_tx.send_modify(|head| head.closed = true);
        debug!("Event store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.head_tx.borrow().closed
    }

    /// Offset of the newest event, or `BEGINNING` if empty.
    pub fn head(&self) -> Offset {
        self.head_tx.borrow().last
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Make the next `read()` fail immediately.
    pub async fn fail_next_read(&self, message: impl Into<String>) {
        self.fail_next_read_after(0, message).await;
    }

    /// Make the next `read()` yield `after_events` events, then fail.
    pub async fn fail_next_read_after(&self, after_events: usize, message: impl Into<String>) {
        self.read_faults.write().await.push_back(ReadFault {
            after_events,
            message: message.into(),
        });
    }

    /// The `after` offset of every read opened so far, in order.
    pub async fn read_offsets(&self) -> Vec<Offset> {
        self.reads.read().await.clone()
    }

    async fn next_after(&self, after: Offset) -> Option<Event> {
        let events = self.events.read().await;
        // Offsets are dense and start at 1, so the index is offset - 1
        let index = usize::try_from(after.value()).ok()?;
        events.get(index).cloned()
    }
}

impl EventSource for InMemoryEventStore {
    fn read(&self, after: Offset) -> EventStream<'_> {
        let head_rx = self.head_tx.subscribe();

        let live = stream::unfold(
            (after, head_rx),
            move |(after, mut head_rx)| async move {
                loop {
                    // Mark the head seen before looking, so no append is missed
                    let closed = head_rx.borrow_and_update().closed;
                    if let Some(event) = self.next_after(after).await {
                        let next = event.offset();
                        return Some((Ok::<Event, ReplayError>(event), (next, head_rx)));
                    }
                    if closed {
                        return None;
                    }
                    if head_rx.changed().await.is_err() {
                        return None;
                    }
                }
            },
        );

        stream::once(async move {
            self.reads.write().await.push(after);
            let fault = self.read_faults.write().await.pop_front();
            match fault {
                None => live.boxed(),
                Some(fault) => {
                    debug!(after = %after, after_events = fault.after_events, "Injecting read fault");
                    let error = ReplayError::source("read", fault.message);
                    live.take(fault.after_events)
                        .chain(stream::once(async move { Err(error) }))
                        .boxed()
                }
            }
        })
        .flatten()
        .boxed()
    }
}

/// In-memory message bus that remembers what it accepted.
pub struct InMemoryMessageBus {
    published: RwLock<Vec<Event>>,
    latest: RwLock<Offset>,
    publish_faults: RwLock<HashMap<Offset, String>>,
    offset_faults: RwLock<VecDeque<String>>,
    offset_queries: AtomicUsize,
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::with_accepted(Offset::BEGINNING)
    }

    /// A bus that has already accepted everything up to `offset`.
    pub fn with_accepted(offset: Offset) -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            latest: RwLock::new(offset),
            publish_faults: RwLock::new(HashMap::new()),
            offset_faults: RwLock::new(VecDeque::new()),
            offset_queries: AtomicUsize::new(0),
        }
    }

    /// Reject the next publish of the event at `offset`, once.
    ///
    /// The reported offset does not move, so the event is retried.
    pub async fn fail_publish_at(&self, offset: Offset, message: impl Into<String>) {
        self.publish_faults.write().await.insert(offset, message.into());
    }

    /// Make the next `latest_accepted_offset()` call fail.
    pub async fn fail_next_offset_query(&self, message: impl Into<String>) {
        self.offset_faults.write().await.push_back(message.into());
    }

    /// Every event accepted so far, in acceptance order.
    pub async fn published(&self) -> Vec<Event> {
        self.published.read().await.clone()
    }

    /// Offsets of every event accepted so far, in acceptance order.
    pub async fn published_offsets(&self) -> Vec<Offset> {
        self.published.read().await.iter().map(Event::offset).collect()
    }

    /// How many times the replay position has been queried.
    pub fn offset_queries(&self) -> usize {
        self.offset_queries.load(Ordering::SeqCst)
    }
}

impl EventSink for InMemoryMessageBus {
    fn latest_accepted_offset(&self) -> BoxFuture<'_, Offset> {
        Box::pin(async move {
            self.offset_queries.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = self.offset_faults.write().await.pop_front() {
                return Err(ReplayError::sink("latest_accepted_offset", message));
            }
            Ok(*self.latest.read().await)
        })
    }

    fn publish(&self, event: Event) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let offset = event.offset();
            if let Some(message) = self.publish_faults.write().await.remove(&offset) {
                return Err(ReplayError::sink("publish", message));
            }

            self.published.write().await.push(event);
            *self.latest.write().await = offset;
            trace!(offset = %offset, "Accepted event");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn store_with(n: usize) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        for i in 0..n {
            store.append(format!("event-{i}").into_bytes()).await.unwrap();
        }
        store
    }

    async fn collect_until_closed(stream: EventStream<'_>) -> Vec<Result<Event>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_append_assigns_dense_offsets() {
        let store = InMemoryEventStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.append(b"a".to_vec()).await.unwrap(), Offset::new(1));
        assert_eq!(store.append(b"b".to_vec()).await.unwrap(), Offset::new(2));
        assert_eq!(store.head(), Offset::new(2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_read_strictly_after_offset() {
        let store = store_with(5).await;
        store.close();

        let events = collect_until_closed(store.read(Offset::new(2))).await;
        let offsets: Vec<_> = events.into_iter().map(|e| e.unwrap().offset()).collect();
        assert_eq!(offsets, vec![Offset::new(3), Offset::new(4), Offset::new(5)]);
        assert_eq!(store.read_offsets().await, vec![Offset::new(2)]);
    }

    #[tokio::test]
    async fn test_read_past_head_is_empty_when_closed() {
        let store = store_with(2).await;
        store.close();
        assert!(collect_until_closed(store.read(Offset::new(9))).await.is_empty());
    }

    #[tokio::test]
    async fn test_append_after_close_fails() {
        let store = store_with(1).await;
        store.close();
        assert!(store.is_closed());
        assert!(store.append(b"late".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_live_read_sees_later_appends() {
        let store = std::sync::Arc::new(store_with(1).await);
        let writer = std::sync::Arc::clone(&store);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.append(b"later".to_vec()).await.unwrap();
            writer.close();
        });

        let events = tokio::time::timeout(Duration::from_secs(5), collect_until_closed(store.read(Offset::BEGINNING)))
            .await
            .expect("live read should end once the store closes");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap().payload(), b"later");
    }

    #[tokio::test]
    async fn test_read_fault_at_open() {
        let store = store_with(3).await;
        store.close();
        store.fail_next_read("disk on fire").await;

        let events = collect_until_closed(store.read(Offset::BEGINNING)).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Err(ReplayError::Source { .. })));

        // Fault is consumed; the next read succeeds
        let events = collect_until_closed(store.read(Offset::BEGINNING)).await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_read_fault_mid_stream() {
        let store = store_with(3).await;
        store.fail_next_read_after(2, "connection reset").await;

        let events = collect_until_closed(store.read(Offset::BEGINNING)).await;
        assert_eq!(events.len(), 3);
        assert!(events[0].is_ok());
        assert!(events[1].is_ok());
        assert!(events[2].is_err());
    }

    #[tokio::test]
    async fn test_bus_tracks_latest_accepted() {
        let bus = InMemoryMessageBus::new();
        assert_eq!(bus.latest_accepted_offset().await.unwrap(), Offset::BEGINNING);

        bus.publish(Event::new(Offset::new(1), b"a".to_vec())).await.unwrap();
        bus.publish(Event::new(Offset::new(2), b"b".to_vec())).await.unwrap();

        assert_eq!(bus.latest_accepted_offset().await.unwrap(), Offset::new(2));
        assert_eq!(bus.published_offsets().await, vec![Offset::new(1), Offset::new(2)]);
        assert_eq!(bus.offset_queries(), 2);
    }

    #[tokio::test]
    async fn test_bus_publish_fault_is_one_shot() {
        let bus = InMemoryMessageBus::with_accepted(Offset::new(4));
        bus.fail_publish_at(Offset::new(5), "broker unavailable").await;

        let event = Event::new(Offset::new(5), b"e".to_vec());
        let err = bus.publish(event.clone()).await.unwrap_err();
        assert!(err.to_string().contains("broker unavailable"));
        // Failed attempt leaves the position alone
        assert_eq!(bus.latest_accepted_offset().await.unwrap(), Offset::new(4));

        bus.publish(event).await.unwrap();
        assert_eq!(bus.latest_accepted_offset().await.unwrap(), Offset::new(5));
    }

    #[tokio::test]
    async fn test_bus_offset_query_fault() {
        let bus = InMemoryMessageBus::new();
        bus.fail_next_offset_query("timeout").await;
        assert!(bus.latest_accepted_offset().await.is_err());
        assert!(bus.latest_accepted_offset().await.is_ok());
    }
}
