// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination primitives shared between instances

pub mod lock;

pub use lock::{FileLocker, LockConfig, LockError, LockGuard, Locker};
