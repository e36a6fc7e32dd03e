// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use taskdesk_common::{Dashboard, DepartmentSummary, Performance, StaffWorkload, TaskCounts};

use super::accounts;

/// How many staff rows the workload distribution keeps.
pub const DISTRIBUTION_LIMIT: i64 = 10;

pub async fn task_counts(pool: &SqlitePool, department_id: i64) -> Result<TaskCounts> {
    sqlx::query_as::<_, TaskCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END), 0) AS completed,
               COALESCE(SUM(CASE WHEN status = 'PENDING' THEN 1 ELSE 0 END), 0) AS pending,
               COALESCE(SUM(CASE WHEN status = 'IN_PROGRESS' THEN 1 ELSE 0 END), 0) AS in_progress,
               COALESCE(SUM(CASE WHEN status = 'OVERDUE' THEN 1 ELSE 0 END), 0) AS overdue
        FROM tasks WHERE department_id = ?
        "#,
    )
    .bind(department_id)
    .fetch_one(pool)
    .await
    .context("Failed to count department tasks")
}

/// Busiest staff first; equal totals keep the order in which their first task
/// was created.
pub async fn workload_distribution(pool: &SqlitePool, department_id: i64) -> Result<Vec<StaffWorkload>> {
    sqlx::query_as::<_, StaffWorkload>(
        r#"
        SELECT t.assigned_to AS staff_id,
               s.name AS name,
               s.emp_id AS emp_id,
               COUNT(*) AS total,
               SUM(CASE WHEN t.status = 'COMPLETED' THEN 1 ELSE 0 END) AS completed,
               SUM(CASE WHEN t.status = 'OVERDUE' THEN 1 ELSE 0 END) AS overdue
        FROM tasks t
        LEFT JOIN staff s ON s.id = t.assigned_to
        WHERE t.department_id = ?
        GROUP BY t.assigned_to
        ORDER BY total DESC, MIN(t.id) ASC
        LIMIT ?
        "#,
    )
    .bind(department_id)
    .bind(DISTRIBUTION_LIMIT)
    .fetch_all(pool)
    .await
    .context("Failed to compute workload distribution")
}

/// Everything the HOD dashboard shows for one department.
pub async fn department_dashboard(pool: &SqlitePool, department_id: i64) -> Result<Dashboard> {
    let department = accounts::find_department(pool, department_id).await?;
    let tasks = task_counts(pool, department_id).await?;
    let staff = accounts::staff_counts(pool, department_id).await?;
    let distribution = workload_distribution(pool, department_id).await?;
    let performance = Performance::from_counts(&tasks);

    Ok(Dashboard {
        department: department.map(|d| DepartmentSummary {
            name: d.name,
            code: d.code,
        }),
        tasks,
        staff,
        distribution,
        performance,
    })
}
