// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::extract::{Json, State};
use taskdesk_common::Dashboard;
use tracing::debug;

use super::AppError;
use crate::AppState;
use crate::auth::SessionUser;
use crate::database::reports;
use crate::policy::{HOD_ONLY, require_role};

/// `GET /dashboard`: department aggregates for the HOD.
pub async fn dashboard(State(state): State<AppState>, session: SessionUser) -> Result<Json<Dashboard>, AppError> {
    require_role(&session, HOD_ONLY)?;
    let dashboard = reports::department_dashboard(&state.pool, session.department).await?;
    debug!(
        "Dashboard for department {}: {} tasks, {} staff",
        session.department, dashboard.tasks.total, dashboard.staff.total
    );
    Ok(Json(dashboard))
}
