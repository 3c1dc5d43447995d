// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the control API
//!
//! Every message is a 4-byte big-endian length prefix followed by a JSON
//! body. The API talks it over tokio sockets; the event channel uses the
//! blocking variants in [`blocking`].

use pj_core::{InstanceMatchCriteria, JobRun};
use pj_engine::ReleaseResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted message body
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default timeout for reading or writing one message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Lines returned by the tail endpoint when the request names none
pub const DEFAULT_TAIL_LINES: usize = 10;

pub mod endpoints {
    pub const INSTANCES: &str = "/instances";
    pub const RELEASE_WAITING: &str = "/instances/release/waiting";
    pub const RELEASE_PENDING: &str = "/instances/release/pending";
    pub const STOP: &str = "/instances/stop";
    pub const TAIL: &str = "/instances/tail";
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    #[error("timed out")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,
}

/// A request addressed to every API server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub endpoint: String,
    /// Instances the request applies to; absent means all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<InstanceMatchCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
}

impl Request {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            criteria: None,
            pending_group: None,
            lines: None,
        }
    }

    pub fn with_criteria(mut self, criteria: InstanceMatchCriteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_pending_group(mut self, group: impl Into<String>) -> Self {
        self.pending_group = Some(group.into());
        self
    }

    pub fn with_lines(mut self, lines: usize) -> Self {
        self.lines = Some(lines);
        self
    }
}

/// Outcome of stopping one instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopResult {
    StopPerformed,
    StopNotApplicable,
}

impl StopResult {
    pub fn as_str(self) -> &'static str {
        match self {
            StopResult::StopPerformed => "STOP_PERFORMED",
            StopResult::StopNotApplicable => "STOP_NOT_APPLICABLE",
        }
    }
}

/// Endpoint-specific part of an instance result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceDetail {
    Listed,
    Release { result: ReleaseResult },
    Stop { result: StopResult },
    Tail { lines: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceResult {
    pub instance: JobRun,
    pub detail: InstanceDetail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorKind {
    /// The request itself was wrong
    ApiClient,
    /// The serving side failed
    ApiServer,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApiErrorKind::ApiClient => "API_CLIENT",
            ApiErrorKind::ApiServer => "API_SERVER",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    InvalidRequest,
    MissingField,
    HandlerFailed,
    Unreachable,
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApiErrorCode::NotFound => "NOT_FOUND",
            ApiErrorCode::InvalidRequest => "INVALID_REQUEST",
            ApiErrorCode::MissingField => "MISSING_FIELD",
            ApiErrorCode::HandlerFailed => "HANDLER_FAILED",
            ApiErrorCode::Unreachable => "UNREACHABLE",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub code: ApiErrorCode,
    pub reason: String,
}

impl ApiError {
    pub fn client(code: ApiErrorCode, reason: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::ApiClient,
            code,
            reason: reason.into(),
        }
    }

    pub fn server(code: ApiErrorCode, reason: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::ApiServer,
            code,
            reason: reason.into(),
        }
    }
}

/// Per-instance results plus per-request errors
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub instances: Vec<InstanceResult>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl Response {
    pub fn from_error(error: ApiError) -> Self {
        Self {
            instances: Vec::new(),
            errors: vec![error],
        }
    }

    /// Append the results and errors of another server's response
    pub fn merge(&mut self, other: Response) {
        self.instances.extend(other.instances);
        self.errors.extend(other.errors);
    }
}

/// Serialize to the JSON body, without the length prefix
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn length_prefix(data: &[u8]) -> Result<[u8; 4], ProtocolError> {
    match u32::try_from(data.len()) {
        Ok(len) if data.len() <= MAX_MESSAGE_SIZE => Ok(len.to_be_bytes()),
        _ => Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        }),
    }
}

fn checked_len(prefix: [u8; 4]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

fn closed_on_eof(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await.map_err(closed_on_eof)?;
    let len = checked_len(prefix)?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(closed_on_eof)?;
    Ok(body)
}

/// Write one message with its length prefix
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let prefix = length_prefix(data)?;
    writer.write_all(&prefix).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_decoded<T, R>(reader: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

async fn write_encoded<T, W>(writer: &mut W, message: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let bytes = encode(message)?;
    tokio::time::timeout(timeout, write_message(writer, &bytes))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    read_decoded(reader, timeout).await
}

pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &Request,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    write_encoded(writer, request, timeout).await
}

pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Response, ProtocolError> {
    read_decoded(reader, timeout).await
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    write_encoded(writer, response, timeout).await
}

/// Same framing over blocking `std::io` streams
pub mod blocking {
    use super::{checked_len, closed_on_eof, length_prefix, ProtocolError};
    use std::io::{Read, Write};

    pub fn read_message<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix).map_err(closed_on_eof)?;
        let len = checked_len(prefix)?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).map_err(closed_on_eof)?;
        Ok(body)
    }

    pub fn write_message<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), ProtocolError> {
        let prefix = length_prefix(data)?;
        writer.write_all(&prefix)?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
