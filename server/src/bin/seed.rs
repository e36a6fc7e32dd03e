// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Loads the department catalogue and, when configured, the first HOD account.

use anyhow::{Context, Result};
use chrono::Utc;
use taskdesk_server::{auth, config::AppConfig, database, database::accounts};

const DEPARTMENTS: &[(&str, &str, &str)] = &[
    ("CSE", "Computer Science & Engineering", "Computer Science and Engineering"),
    ("IT", "Information Technology", "Information Technology"),
    ("ECE", "Electronics & Communication", "Electronics and Communication Engineering"),
    ("EEE", "Electrical & Electronics", "Electrical and Electronics Engineering"),
    ("MECH", "Mechanical Engineering", "Mechanical Engineering"),
    ("CIVIL", "Civil Engineering", "Civil Engineering"),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let pool = database::establish_connection_pool(&config.database.url, config.database.max_connections).await?;

    for (code, name, description) in DEPARTMENTS {
        accounts::upsert_department(&pool, code, name, description).await?;
    }
    tracing::info!("Seeded {} departments.", DEPARTMENTS.len());

    let Some(seed) = config.seed else {
        tracing::info!("No seed HOD configured; done.");
        return Ok(());
    };

    if accounts::find_hod_by_emp_id(&pool, &seed.hod_emp_id).await?.is_some() {
        tracing::info!("HOD {} already exists; leaving it untouched.", seed.hod_emp_id);
        return Ok(());
    }

    let department = accounts::find_department_by_code(&pool, &seed.department_code)
        .await?
        .with_context(|| format!("Unknown department code {}", seed.department_code))?;

    let hod = accounts::create_hod(
        &pool,
        accounts::NewHod {
            name: seed.hod_name,
            emp_id: seed.hod_emp_id,
            email: seed.hod_email,
            department_id: department.id,
            password_hash: auth::hash_password(&seed.hod_password)?,
        },
        Utc::now(),
    )
    .await?;

    tracing::info!("Created HOD {} for {}.", hod.emp_id, department.code);
    Ok(())
}
