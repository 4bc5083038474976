//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Mock EventSource / EventSink implementations that record calls
//! - Polling helpers that work under paused tokio time

pub mod mock;

pub use mock::*;

use std::time::Duration;

/// Event payloads shaped like FHIR message bundles.
#[allow(dead_code)]
pub fn fhir_bundle(id: u64) -> Vec<u8> {
    format!(r#"{{"resourceType":"Bundle","type":"message","id":"msg-{id}"}}"#).into_bytes()
}

/// Poll `check` until it returns true or `timeout` elapses.
///
/// Sleeps on the tokio clock, so it also works under paused time.
/// Returns whether the condition was met.
#[allow(dead_code)]
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
