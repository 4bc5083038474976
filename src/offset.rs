// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event log offsets.
//!
//! An [`Offset`] marks a position in the event store's append-only log.
//! The sink reports the offset of the last event it accepted; the source
//! resumes strictly after that offset.
//!
//! ```text
//! sink reports 41 → source.read(after = 41) → yields 42, 43, ...
//!                   (publish 42 fails = sink still reports 41, 42 re-read)
//! ```

use crate::error::ReplayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of an event in the event log.
///
/// Offsets are totally ordered. [`Offset::BEGINNING`] sorts before every
/// offset a source assigns to a real event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Offset(u64);

impl Offset {
    /// Reported by a sink that has never accepted an event.
    pub const BEGINNING: Offset = Offset(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this is the "nothing accepted yet" sentinel.
    pub fn is_beginning(self) -> bool {
        self == Self::BEGINNING
    }

    /// The smallest offset strictly after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Offset {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ReplayError::InvalidOffset(s.to_string()))
    }
}
