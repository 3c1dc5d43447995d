// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client fan-out over every API server of the socket directory

use crate::protocol::{self, endpoints, ApiError, ApiErrorCode, ProtocolError, Request, Response};
use crate::socket::{socket_files, API_SOCKET_EXT};
use pj_core::config::ApiConfig;
use pj_core::{InstanceMatchCriteria, JobRun};
use pj_engine::{ActiveInstances, LookupError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot list sockets in {}: {source}", dir.display())]
    SocketDir {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Connection timeout")]
    Timeout,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    socket_dir: PathBuf,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(socket_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.socket_dir, config.timeout)
    }

    pub fn socket_dir(&self) -> &Path {
        &self.socket_dir
    }

    /// Send the request to every server and merge the responses in socket order.
    /// Servers that cannot be reached become `API_SERVER`/`UNREACHABLE` entries.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let sockets =
            socket_files(&self.socket_dir, API_SOCKET_EXT).map_err(|source| ClientError::SocketDir {
                dir: self.socket_dir.clone(),
                source,
            })?;

        let request = Arc::new(request.clone());
        let mut pending = JoinSet::new();
        for (index, socket) in sockets.into_iter().enumerate() {
            let request = Arc::clone(&request);
            let timeout = self.timeout;
            pending.spawn(async move {
                let result = send_to(&socket, &request, timeout).await;
                (index, socket, result)
            });
        }

        let mut replies = Vec::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(reply) => replies.push(reply),
                Err(e) => tracing::error!(error = %e, "API request task failed"),
            }
        }
        replies.sort_by_key(|(index, _, _)| *index);

        let mut merged = Response::default();
        for (_, socket, result) in replies {
            match result {
                Ok(response) => merged.merge(response),
                Err(e) => {
                    tracing::debug!(socket = %socket.display(), error = %e, "API server unreachable");
                    merged.errors.push(ApiError::server(
                        ApiErrorCode::Unreachable,
                        format!("{}: {}", socket.display(), e),
                    ));
                }
            }
        }
        Ok(merged)
    }

    pub async fn list(&self, criteria: InstanceMatchCriteria) -> Result<Response, ClientError> {
        self.send(&Request::new(endpoints::INSTANCES).with_criteria(criteria))
            .await
    }

    pub async fn release_waiting(
        &self,
        criteria: InstanceMatchCriteria,
    ) -> Result<Response, ClientError> {
        self.send(&Request::new(endpoints::RELEASE_WAITING).with_criteria(criteria))
            .await
    }

    pub async fn release_pending(
        &self,
        group: &str,
        criteria: InstanceMatchCriteria,
    ) -> Result<Response, ClientError> {
        let request = Request::new(endpoints::RELEASE_PENDING)
            .with_criteria(criteria)
            .with_pending_group(group);
        self.send(&request).await
    }

    pub async fn stop(&self, criteria: InstanceMatchCriteria) -> Result<Response, ClientError> {
        self.send(&Request::new(endpoints::STOP).with_criteria(criteria))
            .await
    }

    pub async fn tail(
        &self,
        criteria: InstanceMatchCriteria,
        lines: Option<usize>,
    ) -> Result<Response, ClientError> {
        let mut request = Request::new(endpoints::TAIL).with_criteria(criteria);
        request.lines = lines;
        self.send(&request).await
    }
}

/// Instances active in every process serving the socket directory
///
/// Lookups block on the given runtime, so they must run on a thread outside
/// of it, such as a `spawn_blocking` task.
pub struct ApiActiveInstances {
    client: ApiClient,
    runtime: Handle,
}

impl ApiActiveInstances {
    pub fn new(client: ApiClient, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

impl ActiveInstances for ApiActiveInstances {
    fn active_instances(&self) -> Result<Vec<JobRun>, LookupError> {
        let response = self
            .runtime
            .block_on(self.client.list(InstanceMatchCriteria::all()))
            .map_err(|e| LookupError(e.to_string()))?;
        for error in &response.errors {
            tracing::debug!(code = ?error.code, reason = %error.reason, "instance lookup incomplete");
        }
        Ok(response
            .instances
            .into_iter()
            .map(|result| result.instance)
            .filter(|run| !run.lifecycle.is_ended())
            .collect())
    }
}

async fn send_to(socket: &Path, request: &Request, timeout: Duration) -> Result<Response, ClientError> {
    let stream = tokio::time::timeout(timeout, UnixStream::connect(socket))
        .await
        .map_err(|_| ClientError::Timeout)??;
    let (mut reader, mut writer) = stream.into_split();

    protocol::write_request(&mut writer, request, timeout).await?;
    Ok(protocol::read_response(&mut reader, timeout).await?)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
