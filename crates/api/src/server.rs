// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use crate::handler::handle_request;
use crate::protocol::{self, ApiError, ApiErrorCode, Response, DEFAULT_TIMEOUT};
use crate::registry::InstanceRegistry;
use crate::socket::{remove_socket, unique_socket_path, API_SOCKET_EXT};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

/// Serves the control API for the runners of one process
pub struct ApiServer {
    listener: UnixListener,
    socket_path: PathBuf,
    registry: Arc<InstanceRegistry>,
}

impl ApiServer {
    /// Bind a new socket in `socket_dir`. Must be called inside a tokio runtime.
    pub fn bind(socket_dir: &Path, registry: Arc<InstanceRegistry>) -> Result<Self, ServerError> {
        let socket_path = unique_socket_path(socket_dir, API_SOCKET_EXT)?;
        let listener = UnixListener::bind(&socket_path)?;
        info!(socket = %socket_path.display(), "API server listening");
        Ok(Self {
            listener,
            socket_path,
            registry,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until `shutdown` completes. The socket file is removed afterwards.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let registry = Arc::clone(&self.registry);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(registry, stream).await {
                                error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Accept error: {}", e),
                },
            }
        }
        debug!(socket = %self.socket_path.display(), "API server stopped");
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        remove_socket(&self.socket_path);
    }
}

/// Handle a single client connection. Requests run on the blocking pool
/// since stopping or releasing a runner waits on its phase lock.
pub async fn handle_connection(
    registry: Arc<InstanceRegistry>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let response = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(request) => {
            debug!("Received request: {:?}", request);
            tokio::task::spawn_blocking(move || handle_request(&registry, &request))
                .await
                .unwrap_or_else(|e| {
                    error!("Request handler failed: {}", e);
                    Response::from_error(ApiError::server(ApiErrorCode::HandlerFailed, e.to_string()))
                })
        }
        Err(protocol::ProtocolError::Json(e)) => {
            warn!("Malformed request: {}", e);
            Response::from_error(ApiError::client(ApiErrorCode::InvalidRequest, e.to_string()))
        }
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}
