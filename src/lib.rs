//! # Event Replay
//!
//! A continuous replay job that keeps a message bus synchronized with an
//! authoritative event store of FHIR event records.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            ReplayJob                                 │
//! │                                                                      │
//! │  ┌──────────────┐  offset  ┌──────────────┐  events  ┌────────────┐  │
//! │  │ EventSink    │─────────►│ EventSource  │─────────►│ EventSink  │  │
//! │  │ (latest      │          │ (read after  │  in      │ (publish)  │  │
//! │  │  accepted)   │          │  offset)     │  order   │            │  │
//! │  └──────────────┘          └──────────────┘          └────────────┘  │
//! │         ▲                                                   │        │
//! │         └──────── next cycle (immediately, or after ◄───────┘        │
//! │                   backoff if the cycle failed)                       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The job owns no position. Every cycle starts by asking the sink where it
//! left off, so a failed publish is simply re-read on the next cycle
//! (at-least-once) and progress made before a failure is never lost. A
//! cycle that ends cleanly without publishing anything waits the idle poll
//! interval before the next one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_replay::{InMemoryEventStore, InMemoryMessageBus, ReplayConfig, ReplayJob};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> event_replay::Result<()> {
//!     let store = Arc::new(InMemoryEventStore::new());
//!     let bus = Arc::new(InMemoryMessageBus::new());
//!
//!     let mut job = ReplayJob::spawn(store.clone(), bus.clone(), ReplayConfig::from_env()?)?;
//!     store.append(br#"{"resourceType":"Bundle"}"#.to_vec()).await?;
//!
//!     // Job runs until shutdown
//!     job.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod job;
pub mod memory;
pub mod metrics;
pub mod offset;
pub mod resilience;
pub mod sink;
pub mod source;

// Re-exports for convenience
pub use config::ReplayConfig;
pub use error::{ReplayError, Result};
pub use event::{Event, EventMeta, EventStream};
pub use job::{JobState, ReplayJob};
pub use memory::{InMemoryEventStore, InMemoryMessageBus};
pub use offset::Offset;
pub use resilience::BackoffConfig;
pub use sink::EventSink;
pub use source::EventSource;
