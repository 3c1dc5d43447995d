// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors shared across the state model

use thiserror::Error;

/// State machine misuse: double prime, run before prime, or an out-of-order transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid state: {0}")]
pub struct InvalidStateError(pub String);

impl InvalidStateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Best-effort text of a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
