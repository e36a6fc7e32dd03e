// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, State},
    http::{HeaderMap, header::AUTHORIZATION},
};
use serde::Serialize;
use tracing::{info, warn};

use super::AppError;
use crate::AppState;
use crate::lifecycle::{self, SweepReport};

#[derive(Serialize)]
pub struct AutomationResponse {
    message: &'static str,
    #[serde(flatten)]
    report: SweepReport,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// `GET /cron/task-automation`: the scheduler's entry point. Runs the full
/// sweep when the shared secret matches; with no secret configured nothing
/// gets in.
pub async fn task_automation(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<AutomationResponse>, AppError> {
    let authorized = match (state.cron_secret.as_deref(), bearer(&headers)) {
        (Some(secret), Some(presented)) => !secret.is_empty() && secret == presented,
        _ => false,
    };
    if !authorized {
        warn!("Rejected scheduled trigger without a valid secret");
        return Err(AppError::unauthorized());
    }

    let report = lifecycle::run_sweep(&state.pool, &state.notifier, state.clock.now()).await?;
    info!(
        "Scheduled sweep: {} overdue, {} reminders",
        report.modified_count, report.reminders_sent
    );

    Ok(Json(AutomationResponse {
        message: "Task automation completed",
        report,
    }))
}
