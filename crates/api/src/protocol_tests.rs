// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use pj_core::MatchingStrategy;

#[test]
fn request_survives_encoding() {
    let request = Request::new(endpoints::RELEASE_PENDING)
        .with_criteria(InstanceMatchCriteria::parse_pattern("backup*", MatchingStrategy::FnMatch))
        .with_pending_group("nightly");

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&Response::default()).expect("encode failed");

    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(json_str.starts_with('{'), "should be JSON object: {}", json_str);
}

#[test]
fn minimal_request_only_needs_endpoint() {
    let request: Request = decode(br#"{"endpoint":"/instances"}"#).expect("decode failed");

    assert_eq!(request, Request::new(endpoints::INSTANCES));
}

#[test]
fn errors_use_upper_case_wire_names() {
    let error = ApiError::client(ApiErrorCode::NotFound, "no such endpoint");

    let json = serde_json::to_value(&error).expect("serialize failed");

    assert_eq!(json["kind"], "API_CLIENT");
    assert_eq!(json["code"], "NOT_FOUND");
}

#[test]
fn stop_results_use_upper_case_wire_names() {
    let json = serde_json::to_value(StopResult::StopNotApplicable).expect("serialize failed");

    assert_eq!(json, "STOP_NOT_APPLICABLE");
}

#[test]
fn merge_keeps_results_and_errors_of_both() {
    let mut response = Response::from_error(ApiError::server(ApiErrorCode::Unreachable, "a"));
    response.merge(Response::from_error(ApiError::server(
        ApiErrorCode::HandlerFailed,
        "b",
    )));

    let codes: Vec<_> = response.errors.iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![ApiErrorCode::Unreachable, ApiErrorCode::HandlerFailed]);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_returns_written_body() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, b"hello world").await.expect("write failed");

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, b"hello world");
}

#[tokio::test]
async fn empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());

    let result = read_message(&mut cursor).await;

    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_prefix_is_rejected_before_reading_body() {
    let prefix = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes();
    let mut cursor = std::io::Cursor::new(prefix.to_vec());

    let result = read_message(&mut cursor).await;

    assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
}

#[tokio::test]
async fn read_request_times_out_on_silent_peer() {
    let (_client, server) = tokio::io::duplex(64);
    let mut server = server;

    let result = read_request(&mut server, Duration::from_millis(20)).await;

    assert!(matches!(result, Err(ProtocolError::Timeout)));
}

#[test]
fn blocking_framing_matches_async_framing() {
    let mut buffer = Vec::new();
    blocking::write_message(&mut buffer, b"event").expect("write failed");

    assert_eq!(&buffer[..4], &5u32.to_be_bytes());
    let mut cursor = std::io::Cursor::new(buffer);
    assert_eq!(blocking::read_message(&mut cursor).expect("read failed"), b"event");
}

#[test]
fn blocking_truncated_body_is_connection_closed() {
    let mut buffer = 10u32.to_be_bytes().to_vec();
    buffer.extend_from_slice(b"abc");
    let mut cursor = std::io::Cursor::new(buffer);

    let result = blocking::read_message(&mut cursor);

    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}
