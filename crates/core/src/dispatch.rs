// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process event propagation
//!
//! A [`Dispatcher`] is registered as an ordinary observer; it serializes each
//! event and sends it over a [`MessageChannel`]. A [`Receiver`] on the other
//! side decodes the frames and replays them into its own notifications, so
//! remote observers receive exactly the same event values as local ones.

use crate::instance::{OutputEvent, TransitionEvent, WarningEvent};
use crate::notification::{Notification, OutputObserver, TransitionObserver, WarningObserver};
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("channel closed")]
    Closed,
}

/// Outgoing side of a framed message transport
pub trait MessageChannel: Send + Sync {
    fn send(&self, message: &[u8]) -> Result<(), ChannelError>;
}

/// Incoming side of a framed message transport
pub trait MessageSource: Send {
    /// Next message, or `None` once the source is closed
    fn receive(&self) -> Result<Option<Vec<u8>>, ChannelError>;
}

/// Wire form of every event that crosses a process boundary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum InstanceEvent {
    InstancePhaseTransition(TransitionEvent),
    InstanceOutput(OutputEvent),
    InstanceWarning(WarningEvent),
}

impl InstanceEvent {
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Observer that forwards every event it receives to a message channel
pub struct Dispatcher<Ch: MessageChannel> {
    channel: Ch,
}

impl<Ch: MessageChannel> Dispatcher<Ch> {
    pub fn new(channel: Ch) -> Self {
        Self { channel }
    }

    pub fn dispatch(&self, event: &InstanceEvent) -> Result<(), ChannelError> {
        let bytes = event.encode()?;
        self.channel.send(&bytes)
    }

    fn dispatch_logged(&self, event: InstanceEvent) {
        if let Err(e) = self.dispatch(&event) {
            tracing::warn!(error = %e, "failed to dispatch event");
        }
    }
}

impl<Ch: MessageChannel> TransitionObserver for Dispatcher<Ch> {
    fn new_transition(&self, event: &TransitionEvent) {
        self.dispatch_logged(InstanceEvent::InstancePhaseTransition(event.clone()));
    }
}

impl<Ch: MessageChannel> OutputObserver for Dispatcher<Ch> {
    fn new_output(&self, event: &OutputEvent) {
        self.dispatch_logged(InstanceEvent::InstanceOutput(event.clone()));
    }
}

impl<Ch: MessageChannel> WarningObserver for Dispatcher<Ch> {
    fn new_warning(&self, event: &WarningEvent) {
        self.dispatch_logged(InstanceEvent::InstanceWarning(event.clone()));
    }
}

/// Replays received events into local notifications
#[derive(Default)]
pub struct Receiver {
    pub transitions: Notification<dyn TransitionObserver>,
    pub outputs: Notification<dyn OutputObserver>,
    pub warnings: Notification<dyn WarningObserver>,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one frame and deliver it to the matching observers
    pub fn deliver(&self, message: &[u8]) -> Result<(), ChannelError> {
        match InstanceEvent::decode(message)? {
            InstanceEvent::InstancePhaseTransition(event) => {
                self.transitions.notify_all(|o| o.new_transition(&event))
            }
            InstanceEvent::InstanceOutput(event) => self.outputs.notify_all(|o| o.new_output(&event)),
            InstanceEvent::InstanceWarning(event) => {
                self.warnings.notify_all(|o| o.new_warning(&event))
            }
        }
        Ok(())
    }

    /// Deliver messages until the source closes. Undecodable frames are logged and skipped.
    pub fn run(&self, source: &dyn MessageSource) -> Result<(), ChannelError> {
        while let Some(message) = source.receive()? {
            if let Err(e) = self.deliver(&message) {
                tracing::warn!(error = %e, "dropping undecodable event");
            }
        }
        Ok(())
    }
}

/// In-process channel, for tests and same-process listeners
pub fn in_memory_channel() -> (InMemorySender, InMemorySource) {
    let (tx, rx) = mpsc::channel();
    (
        InMemorySender {
            tx: Arc::new(Mutex::new(tx)),
        },
        InMemorySource { rx },
    )
}

#[derive(Clone)]
pub struct InMemorySender {
    tx: Arc<Mutex<mpsc::Sender<Vec<u8>>>>,
}

impl MessageChannel for InMemorySender {
    fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        self.tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(message.to_vec())
            .map_err(|_| ChannelError::Closed)
    }
}

pub struct InMemorySource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl InMemorySource {
    /// Wait up to `timeout` for the next message
    pub fn receive_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl MessageSource for InMemorySource {
    fn receive(&self) -> Result<Option<Vec<u8>>, ChannelError> {
        Ok(self.rx.recv().ok())
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
