// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API client construction for CLI commands

use pj_api::{ApiClient, ApiError};
use pj_core::Config;
use std::time::Duration;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Per-server API timeout, `PJ_TIMEOUT_API_MS` overriding the configured one
pub fn timeout_api(config: &Config) -> Duration {
    parse_duration_ms("PJ_TIMEOUT_API_MS").unwrap_or(config.api.timeout)
}

pub fn api_client(config: &Config) -> ApiClient {
    ApiClient::new(&config.api.socket_dir, timeout_api(config))
}

/// Print per-request errors to stderr
pub fn report_errors(errors: &[ApiError]) {
    for error in errors {
        eprintln!("warning: {} {}: {}", error.kind, error.code, error.reason);
    }
}
