// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::AppState;
use crate::handlers::{auth, cron, dashboard, staff, tasks};
use axum::{
    Router,
    routing::{get, patch, post, put},
};
use tower_http::trace::TraceLayer;

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Sessions
        .route("/auth/login", post(auth::login))
        .route("/auth/staff/login", post(auth::staff_login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        // HOD dashboard
        .route("/dashboard", get(dashboard::dashboard))
        // Tasks
        .route(
            "/task",
            get(tasks::list_tasks).post(tasks::create_task).put(tasks::update_task),
        )
        .route("/task/status", patch(tasks::update_task_status))
        .route("/task/mark-overdue", post(tasks::mark_overdue))
        // Scheduled trigger, bearer secret instead of a session
        .route("/cron/task-automation", get(cron::task_automation))
        // Staff
        .route("/staff", get(staff::list_staff).post(staff::create_staff))
        .route("/staff/inactive", put(staff::deactivate_staff))
        .route("/staff/password", put(staff::change_password))
        .route(
            "/staff/reset-password",
            get(staff::validate_reset_token).post(staff::reset_password),
        )
        .route("/staff/reset-password/issue", post(staff::issue_password_reset))
        .route("/staff/{empid}", get(staff::staff_profile))
        .layer(TraceLayer::new_for_http())
        // Adds the shared application state to every handler
        .with_state(state)
}
