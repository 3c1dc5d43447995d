// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process event channel over Unix sockets
//!
//! Each listener binds its own socket in the socket directory. Senders
//! connect to every listener socket and write one framed event per
//! connection, so a listener sees the events of one sender in order.
//! Runners hand their events to a [`QueuedChannel`], so socket writes
//! happen on a writer thread and never inside a phase transition.

use crate::protocol::{blocking, ProtocolError, DEFAULT_TIMEOUT};
use crate::socket::{remove_socket, socket_files, unique_socket_path, LISTENER_SOCKET_EXT};
use pj_core::{
    ChannelError, Dispatcher, MessageChannel, MessageSource, OutputObserver, TransitionObserver,
    WarningObserver, DEFAULT_OBSERVER_PRIORITY,
};
use pj_engine::{InstanceManager, JobRunner, PluginError};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Sends every message to all listener sockets of a directory
#[derive(Clone, Debug)]
pub struct SocketBroadcastChannel {
    socket_dir: PathBuf,
    timeout: Duration,
}

impl SocketBroadcastChannel {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl MessageChannel for SocketBroadcastChannel {
    fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        for socket in socket_files(&self.socket_dir, LISTENER_SOCKET_EXT)? {
            if let Err(e) = send_frame(&socket, message, self.timeout) {
                tracing::debug!(socket = %socket.display(), error = %e, "event listener unreachable");
            }
        }
        Ok(())
    }
}

fn send_frame(socket: &Path, message: &[u8], timeout: Duration) -> Result<(), ProtocolError> {
    let mut stream = UnixStream::connect(socket)?;
    stream.set_write_timeout(Some(timeout))?;
    blocking::write_message(&mut stream, message)
}

/// Hands messages to a writer thread that forwards them to the inner channel
/// in order. Dropping the channel delivers what is still queued.
pub struct QueuedChannel {
    queue: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedChannel {
    pub fn spawn<Ch: MessageChannel + 'static>(inner: Ch) -> std::io::Result<Self> {
        let (queue, pending) = mpsc::channel::<Vec<u8>>();
        let worker = std::thread::Builder::new()
            .name("pj-events".to_string())
            .spawn(move || {
                for message in pending {
                    if let Err(e) = inner.send(&message) {
                        tracing::debug!(error = %e, "event not delivered");
                    }
                }
            })?;
        Ok(Self {
            queue: Mutex::new(Some(queue)),
            worker: Some(worker),
        })
    }
}

impl MessageChannel for QueuedChannel {
    fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        let queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        match queue.as_ref() {
            Some(queue) => queue
                .send(message.to_vec())
                .map_err(|_| ChannelError::Closed),
            None => Err(ChannelError::Closed),
        }
    }
}

impl Drop for QueuedChannel {
    fn drop(&mut self) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("event writer thread panicked");
            }
        }
    }
}

/// Receiving end bound to its own listener socket. The socket file is removed on drop.
pub struct EventListener {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl EventListener {
    pub fn bind(socket_dir: &Path) -> std::io::Result<Self> {
        let socket_path = unique_socket_path(socket_dir, LISTENER_SOCKET_EXT)?;
        let listener = UnixListener::bind(&socket_path)?;
        tracing::info!(socket = %socket_path.display(), "event listener bound");
        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl MessageSource for EventListener {
    /// Blocks until a sender delivers a frame. Broken frames are skipped.
    fn receive(&self) -> Result<Option<Vec<u8>>, ChannelError> {
        loop {
            let (mut stream, _) = self.listener.accept()?;
            stream.set_read_timeout(Some(DEFAULT_TIMEOUT))?;
            match blocking::read_message(&mut stream) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => tracing::debug!(error = %e, "dropping broken event frame"),
            }
        }
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        remove_socket(&self.socket_path);
    }
}

/// Forwards the events of every registered runner to the event listeners
pub struct EventDispatchManager {
    transitions: Arc<dyn TransitionObserver>,
    outputs: Arc<dyn OutputObserver>,
    warnings: Arc<dyn WarningObserver>,
}

impl EventDispatchManager {
    pub fn new<Ch: MessageChannel + 'static>(channel: Ch) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(channel));
        Self {
            transitions: dispatcher.clone(),
            outputs: dispatcher.clone(),
            warnings: dispatcher,
        }
    }

    /// Broadcast to the listeners of `socket_dir` from a dedicated writer thread
    pub fn for_socket_dir(socket_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let channel = QueuedChannel::spawn(SocketBroadcastChannel::new(socket_dir))?;
        Ok(Self::new(channel))
    }
}

impl InstanceManager for EventDispatchManager {
    fn register_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        runner.add_transition_observer(Arc::clone(&self.transitions), DEFAULT_OBSERVER_PRIORITY);
        runner.add_output_observer(Arc::clone(&self.outputs), DEFAULT_OBSERVER_PRIORITY);
        runner.add_warning_observer(Arc::clone(&self.warnings), DEFAULT_OBSERVER_PRIORITY);
        Ok(())
    }

    fn unregister_instance(&self, runner: &Arc<JobRunner>) -> Result<(), PluginError> {
        runner.remove_transition_observer(&self.transitions);
        runner.remove_output_observer(&self.outputs);
        runner.remove_warning_observer(&self.warnings);
        Ok(())
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
