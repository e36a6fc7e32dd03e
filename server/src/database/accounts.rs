// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use taskdesk_common::{Department, Hod, LOCKOUT_MINUTES, MAX_FAILED_LOGINS, Staff, StaffCounts};
use tracing::{debug, info};

pub struct NewHod {
    pub name: String,
    pub emp_id: String,
    pub email: String,
    pub department_id: i64,
    pub password_hash: String,
}

pub struct NewStaff {
    pub emp_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department_id: i64,
    pub password_hash: String,
}

// --- Departments ---

/// Inserts a department, or refreshes its name and description if the code is
/// already known. Returns the department id either way.
pub async fn upsert_department(pool: &SqlitePool, code: &str, name: &str, description: &str) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO departments (name, code, description, is_active) VALUES (?, ?, ?, 1)
        ON CONFLICT(code) DO UPDATE SET name = excluded.name, description = excluded.description, is_active = 1
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(code)
    .bind(description)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to upsert department {}", code))?;

    debug!("Department {} has id {}", code, id);
    Ok(id)
}

pub async fn find_department(pool: &SqlitePool, id: i64) -> Result<Option<Department>> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to load department")
}

pub async fn find_department_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Department>> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await
        .context("Failed to load department by code")
}

// --- HODs ---

pub async fn create_hod(pool: &SqlitePool, new: NewHod, now: DateTime<Utc>) -> Result<Hod> {
    let id = sqlx::query(
        r#"
        INSERT INTO hods (name, emp_id, email, department_id, password_hash, role, is_active, failed_login_attempts, created_at)
        VALUES (?, ?, ?, ?, ?, 'HOD', 1, 0, ?)
        "#,
    )
    .bind(&new.name)
    .bind(&new.emp_id)
    .bind(&new.email)
    .bind(new.department_id)
    .bind(&new.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert HOD into DB")?
    .last_insert_rowid();

    info!("Created HOD {} with ID {}", new.emp_id, id);

    find_hod(pool, id)
        .await?
        .context("HOD vanished right after insert")
}

pub async fn find_hod(pool: &SqlitePool, id: i64) -> Result<Option<Hod>> {
    sqlx::query_as::<_, Hod>("SELECT * FROM hods WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to load HOD")
}

pub async fn find_hod_by_emp_id(pool: &SqlitePool, emp_id: &str) -> Result<Option<Hod>> {
    sqlx::query_as::<_, Hod>("SELECT * FROM hods WHERE emp_id = ?")
        .bind(emp_id)
        .fetch_optional(pool)
        .await
        .context("Failed to load HOD by employee id")
}

/// Counts one more wrong password against the account and locks it once the
/// threshold is reached. Returns the updated attempt count.
pub async fn record_failed_login(pool: &SqlitePool, hod_id: i64, now: DateTime<Utc>) -> Result<i64> {
    let lock_until = now + Duration::minutes(LOCKOUT_MINUTES);

    let (attempts,): (i64,) = sqlx::query_as(
        r#"
        UPDATE hods
        SET failed_login_attempts = failed_login_attempts + 1,
            lock_until = CASE WHEN failed_login_attempts + 1 >= ? THEN ? ELSE lock_until END
        WHERE id = ?
        RETURNING failed_login_attempts
        "#,
    )
    .bind(MAX_FAILED_LOGINS)
    .bind(lock_until)
    .bind(hod_id)
    .fetch_one(pool)
    .await
    .context("Failed to record failed login")?;

    Ok(attempts)
}

pub async fn record_successful_login(pool: &SqlitePool, hod_id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE hods SET failed_login_attempts = 0, lock_until = NULL, last_login = ? WHERE id = ?")
        .bind(now)
        .bind(hod_id)
        .execute(pool)
        .await
        .context("Failed to record successful login")?;
    Ok(())
}

// --- Staff ---

pub async fn create_staff(pool: &SqlitePool, new: NewStaff, now: DateTime<Utc>) -> Result<Staff> {
    let id = sqlx::query(
        r#"
        INSERT INTO staff (emp_id, name, email, phone, department_id, role, password_hash, is_active, required_change_password, created_at)
        VALUES (?, ?, ?, ?, ?, 'STAFF', ?, 1, 1, ?)
        "#,
    )
    .bind(&new.emp_id)
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(new.department_id)
    .bind(&new.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert staff into DB")?
    .last_insert_rowid();

    info!("Created staff {} with ID {}", new.emp_id, id);

    find_staff(pool, id)
        .await?
        .context("Staff vanished right after insert")
}

pub async fn find_staff(pool: &SqlitePool, id: i64) -> Result<Option<Staff>> {
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to load staff")
}

pub async fn find_staff_by_emp_id(pool: &SqlitePool, emp_id: &str) -> Result<Option<Staff>> {
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE emp_id = ?")
        .bind(emp_id)
        .fetch_optional(pool)
        .await
        .context("Failed to load staff by employee id")
}

/// Looks a staff member up by employee id, but only inside `department_id`.
pub async fn find_department_staff(pool: &SqlitePool, department_id: i64, emp_id: &str) -> Result<Option<Staff>> {
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE emp_id = ? AND department_id = ?")
        .bind(emp_id)
        .bind(department_id)
        .fetch_optional(pool)
        .await
        .context("Failed to load department staff")
}

/// Whether any staff account already uses this employee id or email.
pub async fn staff_exists(pool: &SqlitePool, emp_id: &str, email: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM staff WHERE emp_id = ? OR email = ?")
        .bind(emp_id)
        .bind(email)
        .fetch_one(pool)
        .await
        .context("Failed to check for duplicate staff")?;
    Ok(count > 0)
}

pub async fn list_department_staff(pool: &SqlitePool, department_id: i64) -> Result<Vec<Staff>> {
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE department_id = ? ORDER BY name ASC, id ASC")
        .bind(department_id)
        .fetch_all(pool)
        .await
        .context("Failed to list department staff")
}

/// Soft-deactivates a staff member. Returns false when no such staff member
/// exists in the department.
pub async fn deactivate_staff(pool: &SqlitePool, department_id: i64, emp_id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE staff SET is_active = 0 WHERE emp_id = ? AND department_id = ?")
        .bind(emp_id)
        .bind(department_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to deactivate staff {}", emp_id))?;

    info!("Deactivated {} staff rows for {}", result.rows_affected(), emp_id);
    Ok(result.rows_affected() > 0)
}

pub async fn staff_counts(pool: &SqlitePool, department_id: i64) -> Result<StaffCounts> {
    sqlx::query_as::<_, StaffCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
               COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0) AS inactive
        FROM staff WHERE department_id = ?
        "#,
    )
    .bind(department_id)
    .fetch_one(pool)
    .await
    .context("Failed to count department staff")
}

pub async fn set_staff_password(pool: &SqlitePool, staff_id: i64, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE staff SET password_hash = ?, required_change_password = 0, password_changed_at = ? WHERE id = ?",
    )
    .bind(password_hash)
    .bind(now)
    .bind(staff_id)
    .execute(pool)
    .await
    .context("Failed to update staff password")?;
    Ok(())
}

// --- Password reset tokens ---

/// Stores a fresh reset token on the staff record, replacing any earlier one.
pub async fn issue_reset_token(pool: &SqlitePool, staff_id: i64, token: &str) -> Result<()> {
    sqlx::query("UPDATE staff SET password_reset_token = ?, password_reset_valid = 1 WHERE id = ?")
        .bind(token)
        .bind(staff_id)
        .execute(pool)
        .await
        .context("Failed to store reset token")?;
    Ok(())
}

pub async fn find_staff_by_reset_token(pool: &SqlitePool, token: &str) -> Result<Option<Staff>> {
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE password_reset_token = ? AND password_reset_valid = 1")
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to look up reset token")
}

/// Swaps in the new password and burns the token in one statement, so two
/// concurrent submissions of the same token cannot both succeed.
pub async fn consume_reset_token(
    pool: &SqlitePool,
    token: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE staff
        SET password_hash = ?,
            required_change_password = 0,
            password_changed_at = ?,
            password_reset_at = ?,
            password_reset_valid = 0,
            password_reset_token = NULL
        WHERE password_reset_token = ? AND password_reset_valid = 1
        "#,
    )
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .bind(token)
    .execute(pool)
    .await
    .context("Failed to consume reset token")?;

    Ok(result.rows_affected() > 0)
}
