//! Mock EventSource and EventSink for testing.
//!
//! Both record every call with the (tokio) time it happened, so tests can
//! assert on ordering, resume offsets and backoff gaps. Failures are
//! scripted per call.

#![allow(dead_code)]

use event_replay::sink::{BoxFuture, EventSink};
use event_replay::source::EventSource;
use event_replay::{Event, EventStream, Offset, ReplayError};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::Poll;
use std::time::Duration;
use tokio::time::Instant;

/// How a scripted read ends after yielding the matching log entries.
#[derive(Debug, Clone)]
pub enum ReadEnd {
    /// End the stream cleanly (source drained or closed).
    Close,
    /// Never end; wait for events that never come.
    Hang,
    /// Yield this many events, then fail with the message.
    FailAfter(usize, String),
    /// Panic on the first poll, like a buggy client library.
    Panic,
}

/// A recorded read() call.
#[derive(Debug, Clone, Copy)]
pub struct ReadCall {
    pub after: Offset,
    pub at: Instant,
}

/// Source backed by a fixed log, with scripted stream endings.
pub struct MockSource {
    log: Vec<Event>,
    ends: Mutex<VecDeque<ReadEnd>>,
    default_end: ReadEnd,
    reads: Mutex<Vec<ReadCall>>,
}

impl MockSource {
    /// Log with events at offsets 1..=n. Reads hang once scripted ends run out.
    pub fn with_events(n: u64) -> Self {
        let log = (1..=n)
            .map(|i| Event::new(Offset::new(i), super::fhir_bundle(i)))
            .collect();
        Self {
            log,
            ends: Mutex::new(VecDeque::new()),
            default_end: ReadEnd::Hang,
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Script how the next reads end, in order.
    pub fn then(self, ends: impl IntoIterator<Item = ReadEnd>) -> Self {
        self.ends.lock().unwrap().extend(ends);
        self
    }

    /// How reads end once the script runs out.
    pub fn otherwise(mut self, end: ReadEnd) -> Self {
        self.default_end = end;
        self
    }

    pub fn reads(&self) -> Vec<ReadCall> {
        self.reads.lock().unwrap().clone()
    }

    pub fn read_offsets(&self) -> Vec<Offset> {
        self.reads().iter().map(|r| r.after).collect()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }
}

impl EventSource for MockSource {
    fn read(&self, after: Offset) -> EventStream<'_> {
        self.reads.lock().unwrap().push(ReadCall {
            after,
            at: Instant::now(),
        });

        let end = self
            .ends
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_end.clone());

        let events: Vec<Result<Event, ReplayError>> = self
            .log
            .iter()
            .filter(|e| e.offset() > after)
            .cloned()
            .map(Ok)
            .collect();

        match end {
            ReadEnd::Close => stream::iter(events).boxed(),
            ReadEnd::Hang => stream::iter(events).chain(stream::pending()).boxed(),
            ReadEnd::FailAfter(n, message) => stream::iter(events)
                .take(n)
                .chain(stream::once(async move { Err(ReplayError::source("read", message)) }))
                .boxed(),
            ReadEnd::Panic => stream::poll_fn(|_| -> Poll<Option<Result<Event, ReplayError>>> {
                panic!("corrupt segment in event log")
            })
            .boxed(),
        }
    }
}

/// A recorded latest_accepted_offset() call.
#[derive(Debug, Clone, Copy)]
pub struct QueryCall {
    /// What was returned (`None` if the call failed)
    pub returned: Option<Offset>,
    pub at: Instant,
}

/// A recorded publish() attempt.
#[derive(Debug, Clone, Copy)]
pub struct PublishCall {
    pub offset: Offset,
    pub at: Instant,
    pub accepted: bool,
}

/// Sink that accepts in order and reports the last accepted offset.
pub struct MockSink {
    latest: Mutex<Offset>,
    queries: Mutex<Vec<QueryCall>>,
    attempts: Mutex<Vec<PublishCall>>,
    /// offset -> remaining failures
    publish_failures: Mutex<HashMap<Offset, usize>>,
    query_failures: AtomicUsize,
    publish_delay: Duration,
    in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSink {
    pub fn new() -> Self {
        Self::at(Offset::BEGINNING)
    }

    /// A sink that has already accepted up to `offset`.
    pub fn at(offset: Offset) -> Self {
        Self {
            latest: Mutex::new(offset),
            queries: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            publish_failures: Mutex::new(HashMap::new()),
            query_failures: AtomicUsize::new(0),
            publish_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Every publish takes this long to complete.
    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }

    /// Fail the first `times` publishes of the event at `offset`.
    pub fn fail_publish(&self, offset: Offset, times: usize) {
        self.publish_failures.lock().unwrap().insert(offset, times);
    }

    /// Fail the next `times` offset queries.
    pub fn fail_queries(&self, times: usize) {
        self.query_failures.store(times, Ordering::SeqCst);
    }

    /// Move the reported offset as if another writer accepted events.
    pub fn set_latest(&self, offset: Offset) {
        *self.latest.lock().unwrap() = offset;
    }

    pub fn latest(&self) -> Offset {
        *self.latest.lock().unwrap()
    }

    pub fn queries(&self) -> Vec<QueryCall> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn attempts(&self) -> Vec<PublishCall> {
        self.attempts.lock().unwrap().clone()
    }

    /// Offsets of every accepted event, in order.
    pub fn accepted(&self) -> Vec<Offset> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.accepted)
            .map(|p| p.offset)
            .collect()
    }

    /// Offsets of every publish attempt (accepted or not), in order.
    pub fn attempted(&self) -> Vec<Offset> {
        self.attempts.lock().unwrap().iter().map(|p| p.offset).collect()
    }

    /// Publishes currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Publishes that ran to completion (accepted or not).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl EventSink for MockSink {
    fn latest_accepted_offset(&self) -> BoxFuture<'_, Offset> {
        Box::pin(async move {
            let at = Instant::now();
            let should_fail = self
                .query_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

            let returned = if should_fail { None } else { Some(self.latest()) };
            self.queries.lock().unwrap().push(QueryCall { returned, at });

            returned.ok_or_else(|| ReplayError::sink("latest_accepted_offset", "Simulated failure"))
        })
    }

    fn publish(&self, event: Event) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let offset = event.offset();
            let at = Instant::now();
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            if !self.publish_delay.is_zero() {
                tokio::time::sleep(self.publish_delay).await;
            }

            let should_fail = match self.publish_failures.lock().unwrap().get_mut(&offset) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };

            if !should_fail {
                self.set_latest(offset);
            }
            self.attempts.lock().unwrap().push(PublishCall {
                offset,
                at,
                accepted: !should_fail,
            });

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);

            if should_fail {
                Err(ReplayError::sink("publish", "Simulated failure"))
            } else {
                Ok(())
            }
        })
    }
}

/// Sink whose publish never completes. Used to exercise the shutdown timeout.
pub struct StuckSink;

impl EventSink for StuckSink {
    fn latest_accepted_offset(&self) -> BoxFuture<'_, Offset> {
        Box::pin(async { Ok(Offset::BEGINNING) })
    }

    fn publish(&self, _event: Event) -> BoxFuture<'_, ()> {
        Box::pin(futures::future::pending())
    }
}
