// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request routing against the local instance registry

use crate::protocol::{
    endpoints, ApiError, ApiErrorCode, InstanceDetail, InstanceResult, Request, Response,
    StopResult, DEFAULT_TAIL_LINES,
};
use crate::registry::InstanceRegistry;
use pj_core::error::panic_message;
use pj_core::InstanceMatchCriteria;
use pj_engine::JobRunner;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Handle a request and return its response. Never fails: problems become error entries.
pub fn handle_request(registry: &InstanceRegistry, request: &Request) -> Response {
    match catch_unwind(AssertUnwindSafe(|| route(registry, request))) {
        Ok(response) => response,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(endpoint = %request.endpoint, error = %reason, "request handler panicked");
            Response::from_error(ApiError::server(ApiErrorCode::HandlerFailed, reason))
        }
    }
}

fn route(registry: &InstanceRegistry, request: &Request) -> Response {
    let criteria = request.criteria.clone().unwrap_or_default();
    match request.endpoint.as_str() {
        endpoints::INSTANCES => for_each(registry, &criteria, |_| InstanceDetail::Listed),
        endpoints::RELEASE_WAITING => for_each(registry, &criteria, |runner| {
            InstanceDetail::Release {
                result: runner.release(),
            }
        }),
        endpoints::RELEASE_PENDING => match &request.pending_group {
            Some(group) => release_group(registry, &criteria, group),
            None => missing_field("pending_group"),
        },
        endpoints::STOP => match &request.criteria {
            // Stopping everything must be asked for explicitly
            Some(criteria) => for_each(registry, criteria, stop),
            None => missing_field("criteria"),
        },
        endpoints::TAIL => {
            let lines = request.lines.unwrap_or(DEFAULT_TAIL_LINES);
            for_each(registry, &criteria, |runner| InstanceDetail::Tail {
                lines: runner.tail(lines),
            })
        }
        other => {
            tracing::debug!(endpoint = other, "unknown endpoint");
            Response::from_error(ApiError::client(
                ApiErrorCode::NotFound,
                format!("unknown endpoint: {other}"),
            ))
        }
    }
}

fn for_each(
    registry: &InstanceRegistry,
    criteria: &InstanceMatchCriteria,
    apply: impl Fn(&JobRunner) -> InstanceDetail,
) -> Response {
    let instances = registry
        .matching(criteria)
        .iter()
        .map(|runner| result(runner, apply(runner.as_ref())))
        .collect();
    Response {
        instances,
        errors: Vec::new(),
    }
}

fn release_group(
    registry: &InstanceRegistry,
    criteria: &InstanceMatchCriteria,
    group: &str,
) -> Response {
    let instances = registry
        .matching(criteria)
        .iter()
        .filter(|runner| runner.metadata().pending_group() == Some(group))
        .map(|runner| {
            let detail = InstanceDetail::Release {
                result: runner.release(),
            };
            result(runner, detail)
        })
        .collect();
    Response {
        instances,
        errors: Vec::new(),
    }
}

fn stop(runner: &JobRunner) -> InstanceDetail {
    let result = if runner.is_terminated() {
        StopResult::StopNotApplicable
    } else {
        runner.stop();
        StopResult::StopPerformed
    };
    InstanceDetail::Stop { result }
}

/// Snapshot taken after the endpoint acted, so it reflects the action
fn result(runner: &Arc<JobRunner>, detail: InstanceDetail) -> InstanceResult {
    InstanceResult {
        instance: runner.snapshot(),
        detail,
    }
}

fn missing_field(field: &str) -> Response {
    Response::from_error(ApiError::client(
        ApiErrorCode::MissingField,
        format!("missing required field: {field}"),
    ))
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
