// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance ID generation

use crate::clock::{Clock, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique instance identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// Random hex prefix followed by the reversed hex of the UTC microsecond timestamp.
///
/// The random prefix keeps IDs unique when two instances start within the same
/// microsecond or the wall clock steps backwards.
#[derive(Clone, Default)]
pub struct TimestampIdGen<C: Clock = SystemClock> {
    clock: C,
}

impl TimestampIdGen {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> TimestampIdGen<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGen for TimestampIdGen<C> {
    fn next(&self) -> String {
        let random = uuid::Uuid::new_v4();
        let prefix: String = random.as_bytes()[..4]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        let micros = self.clock.now().timestamp_micros();
        let stamp: String = format!("{:x}", micros).chars().rev().collect();
        format!("{}{}", prefix, stamp)
    }
}

/// Sequential ID generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}
