// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use serde_json::json;
use taskdesk_common::LoginPayload;
use tracing::{debug, info};

use super::{AppError, AppJson};
use crate::AppState;
use crate::auth::{self, SessionUser};

fn require_credentials(payload: &LoginPayload) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if payload.emp_id.trim().is_empty() {
        errors.push("empId is required".to_string());
    }
    if payload.password.is_empty() {
        errors.push("password is required".to_string());
    }
    if errors.is_empty() { Ok(()) } else { Err(AppError::validation(errors)) }
}

/// `POST /auth/login`: HOD login with lockout.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    require_credentials(&payload)?;
    debug!("HOD login attempt for {}", payload.emp_id);

    let user = auth::login_hod(&state.pool, payload.emp_id.trim(), &payload.password, state.clock.now()).await?;
    let token = state.sessions.issue(&user)?;

    Ok((
        AppendHeaders([(SET_COOKIE, state.sessions.session_cookie(&token))]),
        Json(json!({ "message": "Login successful", "user": user, "token": token })),
    ))
}

/// `POST /auth/staff/login`
pub async fn staff_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    require_credentials(&payload)?;
    debug!("Staff login attempt for {}", payload.emp_id);

    let (user, required_change) = auth::login_staff(&state.pool, payload.emp_id.trim(), &payload.password).await?;
    let token = state.sessions.issue(&user)?;

    Ok((
        AppendHeaders([(SET_COOKIE, state.sessions.session_cookie(&token))]),
        Json(json!({
            "message": "Login successful",
            "user": user,
            "token": token,
            "requiredChangePassword": required_change,
        })),
    ))
}

/// `POST /auth/logout`. Works with or without a session.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    info!("Session cleared");
    (
        AppendHeaders([(SET_COOKIE, state.sessions.clear_cookie())]),
        Json(json!({ "message": "Logged out" })),
    )
}

/// `GET /auth/session`
pub async fn session(user: SessionUser) -> Json<SessionUser> {
    Json(user)
}
