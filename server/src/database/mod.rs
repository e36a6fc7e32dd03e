// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod accounts;
pub mod reports;
pub mod tasks;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

const SCHEMA: &[(&str, &str)] = &[
    (
        "departments",
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            is_active BOOLEAN NOT NULL DEFAULT 1
        );
        "#,
    ),
    (
        "hods",
        r#"
        CREATE TABLE IF NOT EXISTS hods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            emp_id TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            department_id INTEGER NOT NULL REFERENCES departments(id),
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'HOD',
            is_active BOOLEAN NOT NULL DEFAULT 1,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            lock_until TIMESTAMP WITH TIME ZONE NULL,
            last_login TIMESTAMP WITH TIME ZONE NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL
        );
        "#,
    ),
    (
        "staff",
        r#"
        CREATE TABLE IF NOT EXISTS staff (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            emp_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL,
            department_id INTEGER NOT NULL REFERENCES departments(id),
            role TEXT NOT NULL DEFAULT 'STAFF',
            password_hash TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            required_change_password BOOLEAN NOT NULL DEFAULT 1,
            password_reset_token TEXT NULL,
            password_reset_valid BOOLEAN NOT NULL DEFAULT 0,
            password_changed_at TIMESTAMP WITH TIME ZONE NULL,
            password_reset_at TIMESTAMP WITH TIME ZONE NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL
        );
        "#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            department_id INTEGER NOT NULL REFERENCES departments(id),
            assigned_to INTEGER NOT NULL REFERENCES staff(id),
            assigned_by INTEGER NOT NULL REFERENCES hods(id),
            due_date TIMESTAMP WITH TIME ZONE NOT NULL,
            priority TEXT NOT NULL DEFAULT 'MEDIUM',
            status TEXT NOT NULL DEFAULT 'PENDING',
            reminder_sent BOOLEAN NOT NULL DEFAULT 0,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL,
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL
        );
        "#,
    ),
];

/// Establishes the database connection pool, creating the database file if it
/// does not exist yet, and makes sure every table is in place.
///
/// In-memory databases are limited to a single connection: each SQLite
/// connection to `:memory:` would otherwise see its own empty database.
pub async fn establish_connection_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating database directory {}", parent.display());
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        max_connections.max(1)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Creates any missing table.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for (table, ddl) in SCHEMA {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create '{}' table", table))?;
    }
    info!("Database schema is ready.");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{DateTime, Utc};
    use taskdesk_common::{Hod, Staff};

    /// Fresh, isolated in-memory database for one test.
    pub async fn setup_test_db() -> SqlitePool {
        establish_connection_pool("sqlite::memory:", 1)
            .await
            .expect("in-memory database")
    }

    pub async fn department(pool: &SqlitePool, code: &str) -> i64 {
        accounts::upsert_department(pool, code, code, "")
            .await
            .expect("department")
    }

    pub async fn hod(pool: &SqlitePool, emp_id: &str, department_id: i64, now: DateTime<Utc>) -> Hod {
        accounts::create_hod(
            pool,
            accounts::NewHod {
                name: format!("HOD {}", emp_id),
                emp_id: emp_id.to_string(),
                email: format!("{}@college.edu", emp_id.to_lowercase()),
                department_id,
                password_hash: "not-a-real-hash".to_string(),
            },
            now,
        )
        .await
        .expect("hod")
    }

    pub async fn staff(pool: &SqlitePool, emp_id: &str, department_id: i64, now: DateTime<Utc>) -> Staff {
        accounts::create_staff(
            pool,
            accounts::NewStaff {
                emp_id: emp_id.to_string(),
                name: format!("Staff {}", emp_id),
                email: format!("{}@college.edu", emp_id.to_lowercase()),
                phone: "9876543210".to_string(),
                department_id,
                password_hash: "not-a-real-hash".to_string(),
            },
            now,
        )
        .await
        .expect("staff")
    }
}
