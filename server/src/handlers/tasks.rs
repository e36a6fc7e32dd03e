// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use taskdesk_common::{
    CreateTaskPayload, Role, Staff, TaskListing, TaskPriority, TaskStatus, TaskStatusPayload,
    UpdateTaskPayload, parse_due_date,
};
use tracing::{debug, info, warn};

use super::{AppError, AppJson};
use crate::AppState;
use crate::auth::SessionUser;
use crate::database::{
    accounts,
    tasks::{self, NewTask, TaskScope},
};
use crate::lifecycle;
use crate::policy::{ANY_ROLE, HOD_ONLY, STAFF_ONLY, authorize, require_role};

fn transition_error(from: TaskStatus, to: TaskStatus) -> String {
    format!("cannot move task from {} to {}", from, to)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves the staff member a task is (re)assigned to and makes sure they
/// belong to the caller's department.
async fn resolve_assignee(state: &AppState, session: &SessionUser, staff_id: i64) -> Result<Staff, AppError> {
    let Some(staff) = accounts::find_staff(&state.pool, staff_id).await? else {
        return Err(AppError::not_found("Assigned staff not found"));
    };
    authorize(session, HOD_ONLY, Some(staff.department_id), None)
        .or_deny(session, "Cannot assign tasks to staff of another department")?;
    if !staff.is_active {
        return Err(AppError::validation(vec![format!("staff {} is inactive", staff.emp_id)]));
    }
    Ok(staff)
}

/// `POST /task`
pub async fn create_task(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<CreateTaskPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&session, HOD_ONLY)?;
    debug!("Received request to create task from {}", session.emp_id);

    let mut errors = Vec::new();
    let title = non_blank(&payload.title);
    if title.is_none() {
        errors.push("title is required".to_string());
    }
    let description = non_blank(&payload.description);
    if description.is_none() {
        errors.push("description is required".to_string());
    }
    if payload.department.is_none() {
        errors.push("department is required".to_string());
    }
    if payload.assigned_to.is_none() {
        errors.push("assignedTo is required".to_string());
    }
    let due_date = match non_blank(&payload.due_date) {
        None => {
            errors.push("dueDate is required".to_string());
            None
        }
        Some(raw) => {
            let parsed = parse_due_date(raw);
            if parsed.is_none() {
                errors.push("dueDate is not a valid date".to_string());
            }
            parsed
        }
    };
    let priority = match non_blank(&payload.priority) {
        None => TaskPriority::default(),
        Some(raw) => raw.parse::<TaskPriority>().unwrap_or_else(|e| {
            errors.push(e);
            TaskPriority::default()
        }),
    };

    // New tasks always start out PENDING; a status is only checked for shape.
    if let Some(Err(e)) = non_blank(&payload.status).map(str::parse::<TaskStatus>) {
        errors.push(e);
    }

    let (Some(title), Some(description), Some(department), Some(assigned_to), Some(due_date), true) = (
        title,
        description,
        payload.department,
        payload.assigned_to,
        due_date,
        errors.is_empty(),
    ) else {
        warn!("Task creation rejected: {:?}", errors);
        return Err(AppError::validation(errors));
    };

    authorize(&session, HOD_ONLY, Some(department), None)
        .or_deny(&session, "Cannot create tasks for another department")?;
    let assignee = resolve_assignee(&state, &session, assigned_to).await?;

    let task = tasks::create_task_in_db(
        &state.pool,
        NewTask {
            title: title.to_string(),
            description: description.to_string(),
            department_id: department,
            assigned_to: assignee.id,
            assigned_by: session.id,
            due_date,
            priority,
        },
        state.clock.now(),
    )
    .await?;

    info!("Task created successfully with ID: {}", task.id);
    state.notifier.task_assigned(&assignee.email, &task);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Task created successfully", "task": task })),
    ))
}

/// `PUT /task`: partial update by the HOD who created the task. Fields left
/// out of the body keep their value.
pub async fn update_task(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<UpdateTaskPayload>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, HOD_ONLY)?;
    let Some(task_id) = payload.id else {
        return Err(AppError::validation(vec!["id is required".to_string()]));
    };

    let Some(mut task) = tasks::find_task(&state.pool, task_id).await? else {
        return Err(AppError::not_found("Task not found"));
    };
    authorize(&session, HOD_ONLY, Some(task.department_id), Some(task.assigned_by))
        .or_deny(&session, "You can only update tasks you created")?;
    authorize(&session, HOD_ONLY, payload.department, None)
        .or_deny(&session, "Cannot move tasks to another department")?;

    let mut errors = Vec::new();
    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            errors.push("title cannot be empty".to_string());
        } else {
            task.title = title.trim().to_string();
        }
    }
    if let Some(description) = &payload.description {
        if description.trim().is_empty() {
            errors.push("description cannot be empty".to_string());
        } else {
            task.description = description.trim().to_string();
        }
    }
    if let Some(raw) = &payload.due_date {
        match parse_due_date(raw) {
            Some(due) if due != task.due_date => {
                task.due_date = due;
                task.reminder_sent = false;
            }
            Some(_) => {}
            None => errors.push("dueDate is not a valid date".to_string()),
        }
    }
    if let Some(raw) = &payload.priority {
        match raw.parse::<TaskPriority>() {
            Ok(priority) => task.priority = priority,
            Err(e) => errors.push(e),
        }
    }
    if let Some(raw) = &payload.status {
        match raw.parse::<TaskStatus>() {
            Ok(status) if task.status.can_transition(status, Role::Hod) => task.status = status,
            Ok(status) => errors.push(transition_error(task.status, status)),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        warn!("Update of task {} rejected: {:?}", task.id, errors);
        return Err(AppError::validation(errors));
    }

    let assignee = match payload.assigned_to {
        Some(staff_id) => Some(resolve_assignee(&state, &session, staff_id).await?),
        None => None,
    };
    if let Some(assignee) = &assignee {
        task.assigned_to = assignee.id;
    }

    task.updated_at = state.clock.now();
    tasks::save_task(&state.pool, &task).await?;
    info!("Task {} updated by {}", task.id, session.emp_id);

    let assignee = match assignee {
        Some(staff) => Some(staff),
        None => accounts::find_staff(&state.pool, task.assigned_to).await.unwrap_or_else(|e| {
            warn!("Could not look up assignee of task {} for mail: {:?}", task.id, e);
            None
        }),
    };
    if let Some(staff) = assignee {
        state.notifier.task_updated(&staff.email, &task);
    }

    Ok(Json(json!({ "message": "Task updated successfully", "task": task })))
}

/// `GET /task`: the whole department for an HOD, own tasks for staff.
pub async fn list_tasks(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<Value>, AppError> {
    require_role(&session, ANY_ROLE)?;
    let scope = match session.role {
        Role::Hod => TaskScope::Department(session.department),
        Role::Staff => TaskScope::Assignee {
            department_id: session.department,
            staff_id: session.id,
        },
    };

    let tasks: Vec<TaskListing> = tasks::list_tasks(&state.pool, scope).await?;
    info!("Successfully retrieved {} tasks for {}.", tasks.len(), session.emp_id);
    Ok(Json(json!({ "tasks": tasks })))
}

/// `PATCH /task/status`: the assignee moves their own task along.
pub async fn update_task_status(
    State(state): State<AppState>,
    session: SessionUser,
    AppJson(payload): AppJson<TaskStatusPayload>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, STAFF_ONLY)?;

    let Some(mut task) = tasks::find_task(&state.pool, payload.id).await? else {
        return Err(AppError::not_found("Task not found"));
    };
    authorize(&session, STAFF_ONLY, Some(task.department_id), Some(task.assigned_to))
        .or_deny(&session, "You can only update your own tasks")?;

    let status = payload
        .status
        .parse::<TaskStatus>()
        .map_err(|e| AppError::validation(vec![e]))?;
    if !task.status.can_transition(status, Role::Staff) {
        return Err(AppError::validation(vec![transition_error(task.status, status)]));
    }

    task.status = status;
    task.updated_at = state.clock.now();
    tasks::save_task(&state.pool, &task).await?;
    info!("Task {} moved to {} by {}", task.id, status, session.emp_id);

    match accounts::find_hod(&state.pool, task.assigned_by).await {
        Ok(Some(hod)) => state.notifier.task_updated(&hod.email, &task),
        Ok(None) => debug!("Task {} has no assigning HOD to notify", task.id),
        Err(e) => warn!("Could not look up HOD of task {} for mail: {:?}", task.id, e),
    }

    Ok(Json(json!({ "message": "Task status updated", "task": task })))
}

/// `POST /task/mark-overdue`
pub async fn mark_overdue(State(state): State<AppState>, session: SessionUser) -> Result<Json<Value>, AppError> {
    require_role(&session, ANY_ROLE)?;
    let modified = lifecycle::mark_overdue(&state.pool, state.clock.now()).await?;
    Ok(Json(json!({
        "message": "Overdue tasks updated",
        "modifiedCount": modified,
    })))
}
