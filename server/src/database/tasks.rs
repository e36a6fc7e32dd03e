// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use taskdesk_common::{Task, TaskListing, TaskPriority, TaskStatus};
use tracing::{debug, info};

pub struct NewTask {
    pub title: String,
    pub description: String,
    pub department_id: i64,
    pub assigned_to: i64,
    pub assigned_by: i64,
    pub due_date: DateTime<Utc>,
    pub priority: TaskPriority,
}

/// Who is asking for a task list. HODs see their whole department, staff only
/// what is assigned to them.
#[derive(Debug, Clone, Copy)]
pub enum TaskScope {
    Department(i64),
    Assignee { department_id: i64, staff_id: i64 },
}

/// A task due soon together with whatever contact details its assignee has.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderCandidate {
    #[sqlx(flatten)]
    pub task: Task,
    pub assignee_name: Option<String>,
    pub assignee_email: Option<String>,
}

const LISTING_SELECT: &str = r#"
    SELECT t.*,
           s.name AS assignee_name, s.emp_id AS assignee_emp_id, s.email AS assignee_email,
           h.name AS assigner_name, h.emp_id AS assigner_emp_id
    FROM tasks t
    LEFT JOIN staff s ON s.id = t.assigned_to
    LEFT JOIN hods h ON h.id = t.assigned_by
"#;

/// Inserts a new task. Every new task starts out `PENDING` with no reminder sent.
pub async fn create_task_in_db(pool: &SqlitePool, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
    debug!(
        "Insert values: title={}, department={}, assigned_to={}, assigned_by={}, due_date={}, priority={}",
        new.title, new.department_id, new.assigned_to, new.assigned_by, new.due_date, new.priority
    );

    let id = sqlx::query(
        r#"
        INSERT INTO tasks (title, description, department_id, assigned_to, assigned_by, due_date, priority, status, reminder_sent, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'PENDING', 0, ?, ?)
        "#,
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.department_id)
    .bind(new.assigned_to)
    .bind(new.assigned_by)
    .bind(new.due_date)
    .bind(new.priority)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert task into DB")?
    .last_insert_rowid();

    Ok(Task {
        id,
        title: new.title,
        description: new.description,
        department_id: new.department_id,
        assigned_to: new.assigned_to,
        assigned_by: new.assigned_by,
        due_date: new.due_date,
        priority: new.priority,
        status: TaskStatus::Pending,
        reminder_sent: false,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_task(pool: &SqlitePool, task_id: i64) -> Result<Option<Task>> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to load task {}", task_id))
}

/// Writes every mutable column of `task` back. Last write wins.
pub async fn save_task(pool: &SqlitePool, task: &Task) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, assigned_to = ?, due_date = ?, priority = ?, status = ?,
            reminder_sent = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.assigned_to)
    .bind(task.due_date)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.reminder_sent)
    .bind(task.updated_at)
    .bind(task.id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to update task {}", task.id))?;
    Ok(())
}

/// Lists tasks visible to `scope`, newest first.
pub async fn list_tasks(pool: &SqlitePool, scope: TaskScope) -> Result<Vec<TaskListing>> {
    let tasks = match scope {
        TaskScope::Department(department_id) => {
            let sql = format!("{} WHERE t.department_id = ? ORDER BY t.created_at DESC, t.id DESC", LISTING_SELECT);
            sqlx::query_as::<_, TaskListing>(&sql)
                .bind(department_id)
                .fetch_all(pool)
                .await
        }
        TaskScope::Assignee { department_id, staff_id } => {
            let sql = format!(
                "{} WHERE t.department_id = ? AND t.assigned_to = ? ORDER BY t.created_at DESC, t.id DESC",
                LISTING_SELECT
            );
            sqlx::query_as::<_, TaskListing>(&sql)
                .bind(department_id)
                .bind(staff_id)
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list tasks")?;

    Ok(tasks)
}

/// Moves every open task whose due date has passed to `OVERDUE` in one
/// statement. Running it again straight away changes nothing.
pub async fn mark_overdue_in_db(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE tasks SET status = 'OVERDUE', updated_at = ?
        WHERE due_date < ? AND status IN ('PENDING', 'IN_PROGRESS')
        "#,
    )
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to mark overdue tasks in DB")?;

    let modified = result.rows_affected();
    info!("Marked {} tasks as OVERDUE.", modified);
    Ok(modified)
}

/// Open tasks due in `[from, until)` that have not been reminded yet.
pub async fn tasks_due_between(
    pool: &SqlitePool,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<ReminderCandidate>> {
    sqlx::query_as::<_, ReminderCandidate>(
        r#"
        SELECT t.*, s.name AS assignee_name, s.email AS assignee_email
        FROM tasks t
        LEFT JOIN staff s ON s.id = t.assigned_to
        WHERE t.due_date >= ? AND t.due_date < ?
          AND t.reminder_sent = 0
          AND t.status IN ('PENDING', 'IN_PROGRESS')
        ORDER BY t.due_date ASC, t.id ASC
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await
    .context("Failed to load tasks due for a reminder")
}

pub async fn mark_reminded(pool: &SqlitePool, task_id: i64) -> Result<()> {
    sqlx::query("UPDATE tasks SET reminder_sent = 1 WHERE id = ?")
        .bind(task_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to flag reminder for task {}", task_id))?;
    Ok(())
}

/// Per-status counts of the tasks assigned to one staff member. Every status
/// is present in the map, zero or not.
pub async fn assignee_status_counts(pool: &SqlitePool, staff_id: i64) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(TaskStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM tasks WHERE assigned_to = ? GROUP BY status")
            .bind(staff_id)
            .fetch_all(pool)
            .await
            .context("Failed to count tasks by status")?;

    let mut by_status: BTreeMap<String, i64> =
        TaskStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
    for (status, count) in rows {
        by_status.insert(status.as_str().to_string(), count);
    }
    Ok(by_status)
}
