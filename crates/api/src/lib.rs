// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pj-api: control API and cross-process event channel
//!
//! Every process running instances serves the API on its own socket in a
//! shared directory; clients fan requests out to all of them.

pub mod client;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod socket;

pub use client::{ApiActiveInstances, ApiClient, ClientError};
pub use events::{EventDispatchManager, EventListener, QueuedChannel, SocketBroadcastChannel};
pub use handler::handle_request;
pub use protocol::{
    endpoints, ApiError, ApiErrorCode, ApiErrorKind, InstanceDetail, InstanceResult, ProtocolError,
    Request, Response, StopResult,
};
pub use registry::InstanceRegistry;
pub use server::{ApiServer, ServerError};
