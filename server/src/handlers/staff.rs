// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Value, json};
use taskdesk_common::{
    ChangePasswordPayload, CreateStaffPayload, EmpIdPayload, MIN_PASSWORD_LEN, ResetPasswordPayload, Staff,
};
use tracing::{debug, info, warn};

use super::{AppError, AppJson, AppQuery};
use crate::AppState;
use crate::auth::{self, SessionUser};
use crate::database::{accounts, tasks};
use crate::policy::{ANY_ROLE, HOD_ONLY, STAFF_ONLY, authorize, require_role};

const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9]{10}$").unwrap();
}

fn password_rule() -> String {
    format!("password must be at least {} characters", MIN_PASSWORD_LEN)
}

/// `POST /staff`: an HOD opens an account for someone in their department.
/// The generated password is mailed and has to be changed on first login.
pub async fn create_staff(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<CreateStaffPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&session, HOD_ONLY)?;

    let field = |value: &Option<String>| value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from);
    let emp_id = field(&payload.emp_id);
    let first_name = field(&payload.first_name);
    let last_name = field(&payload.last_name);
    let email = field(&payload.email).map(|e| e.to_lowercase());
    let phone = field(&payload.phone);

    let mut errors = Vec::new();
    if emp_id.is_none() {
        errors.push("empId is required".to_string());
    }
    if first_name.is_none() {
        errors.push("firstName is required".to_string());
    }
    if last_name.is_none() {
        errors.push("lastName is required".to_string());
    }
    match &email {
        None => errors.push("email is required".to_string()),
        Some(e) if !EMAIL_RE.is_match(e) => errors.push("email is not valid".to_string()),
        Some(_) => {}
    }
    match &phone {
        None => errors.push("phone is required".to_string()),
        Some(p) if !PHONE_RE.is_match(p) => errors.push("phone must be exactly 10 digits".to_string()),
        Some(_) => {}
    }
    if payload.department.is_none() {
        errors.push("department is required".to_string());
    }

    let (Some(emp_id), Some(first_name), Some(last_name), Some(email), Some(phone), Some(department), true) = (
        emp_id,
        first_name,
        last_name,
        email,
        phone,
        payload.department,
        errors.is_empty(),
    ) else {
        warn!("Staff creation rejected: {:?}", errors);
        return Err(AppError::validation(errors));
    };

    authorize(&session, HOD_ONLY, Some(department), None)
        .or_deny(&session, "Cannot create staff for another department")?;

    if accounts::staff_exists(&state.pool, &emp_id, &email).await? {
        return Err(AppError::conflict("Staff with this Employee ID or email already exists"));
    }

    let password = auth::generate_password();
    let staff = accounts::create_staff(
        &state.pool,
        accounts::NewStaff {
            emp_id,
            name: format!("{} {}", first_name, last_name),
            email,
            phone,
            department_id: department,
            password_hash: auth::hash_password(&password)?,
        },
        state.clock.now(),
    )
    .await?;

    state.notifier.staff_credentials(&staff, &password);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Staff created successfully",
            "staff": { "empId": staff.emp_id, "name": staff.name, "email": staff.email },
        })),
    ))
}

/// `GET /staff`
pub async fn list_staff(State(state): State<AppState>, session: SessionUser) -> Result<Json<Value>, AppError> {
    require_role(&session, ANY_ROLE)?;
    let staff: Vec<Staff> = accounts::list_department_staff(&state.pool, session.department).await?;
    debug!("Listed {} staff for department {}", staff.len(), session.department);
    Ok(Json(json!({ "staff": staff })))
}

/// `PUT /staff/inactive`
pub async fn deactivate_staff(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<EmpIdPayload>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, HOD_ONLY)?;
    if !accounts::deactivate_staff(&state.pool, session.department, payload.emp_id.trim()).await? {
        return Err(AppError::not_found("Staff not found"));
    }
    info!("Staff {} deactivated by {}", payload.emp_id, session.emp_id);
    Ok(Json(json!({ "message": "Staff deactivated" })))
}

/// `GET /staff/{empid}`: profile plus task counts by status.
pub async fn staff_profile(
    State(state): State<AppState>,
    session: SessionUser,
    Path(emp_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, ANY_ROLE)?;

    let Some(staff) = accounts::find_staff_by_emp_id(&state.pool, &emp_id).await? else {
        return Err(AppError::not_found("Staff not found"));
    };
    authorize(&session, ANY_ROLE, Some(staff.department_id), None)
        .or_deny(&session, "Staff belongs to another department")?;

    let by_status = tasks::assignee_status_counts(&state.pool, staff.id).await?;
    let total: i64 = by_status.values().sum();

    Ok(Json(json!({
        "staff": staff,
        "stats": { "total": total, "byStatus": by_status },
    })))
}

/// `PUT /staff/password`: a staff member replaces their own password.
pub async fn change_password(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<ChangePasswordPayload>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, STAFF_ONLY)?;
    if payload.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(vec![password_rule()]));
    }

    let Some(staff) = accounts::find_staff(&state.pool, session.id).await? else {
        return Err(AppError::not_found("Staff not found"));
    };
    if !auth::verify_password(&payload.current_password, &staff.password_hash) {
        return Err(AppError::validation(vec!["current password is incorrect".to_string()]));
    }

    let hash = auth::hash_password(&payload.new_password)?;
    accounts::set_staff_password(&state.pool, staff.id, &hash, state.clock.now()).await?;
    info!("Staff {} changed their password", staff.emp_id);
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// `POST /staff/reset-password/issue`: mails a single-use reset link.
pub async fn issue_password_reset(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<EmpIdPayload>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, HOD_ONLY)?;

    let Some(staff) = accounts::find_staff_by_emp_id(&state.pool, payload.emp_id.trim()).await? else {
        return Err(AppError::not_found("Staff not found"));
    };
    authorize(&session, HOD_ONLY, Some(staff.department_id), None)
        .or_deny(&session, "Staff belongs to another department")?;

    let token = auth::generate_reset_token();
    accounts::issue_reset_token(&state.pool, staff.id, &token).await?;
    state.notifier.password_reset(&staff, &token);
    info!("Password reset issued for {} by {}", staff.emp_id, session.emp_id);

    Ok(Json(json!({ "message": "Password reset link sent" })))
}

/// `GET /staff/reset-password?ref=`: tells the reset page whether the token
/// is still usable. Unknown and already used tokens look the same.
pub async fn validate_reset_token(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ResetPasswordPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Some(token) = query.token() else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "valid": false, "message": "Reset token is required" })),
        ));
    };

    match accounts::find_staff_by_reset_token(&state.pool, token).await? {
        Some(staff) => Ok((
            StatusCode::OK,
            Json(json!({ "valid": true, "empId": staff.emp_id, "name": staff.name })),
        )),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "valid": false, "message": INVALID_RESET_TOKEN })),
        )),
    }
}

/// `POST /staff/reset-password`
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordPayload>,
) -> Result<Json<Value>, AppError> {
    let mut errors = Vec::new();
    let token = payload.token();
    if token.is_none() {
        errors.push("token is required".to_string());
    }
    let password = payload.password.as_deref().unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(password_rule());
    }
    let (Some(token), true) = (token, errors.is_empty()) else {
        return Err(AppError::validation(errors));
    };

    let hash = auth::hash_password(password)?;
    if !accounts::consume_reset_token(&state.pool, token, &hash, state.clock.now()).await? {
        warn!("Rejected password reset with an unusable token");
        return Err(AppError::not_found(INVALID_RESET_TOKEN));
    }

    info!("Password reset completed");
    Ok(Json(json!({ "message": "Password reset successful" })))
}
