// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::database::tasks;
use crate::mail::Notifier;

/// Outcome of one sweep.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub modified_count: u64,
    pub reminders_sent: usize,
}

/// Open tasks past their due date become `OVERDUE`.
pub async fn mark_overdue(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    debug!("Marking tasks due before {} as overdue", now);
    tasks::mark_overdue_in_db(pool, now).await
}

/// The whole of tomorrow (UTC) as a half-open range.
pub fn reminder_window(now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let tomorrow = now
        .date_naive()
        .succ_opt()
        .context("Failed to get tomorrow's date")?;
    let start = tomorrow
        .and_hms_opt(0, 0, 0)
        .context("Failed to build tomorrow's midnight")?
        .and_utc();
    Ok((start, start + Duration::days(1)))
}

/// Queues a "due tomorrow" mail for every open task due tomorrow that has not
/// been reminded yet, and flags it. Tasks whose assignee has no email are
/// skipped and stay unflagged.
pub async fn dispatch_reminders(pool: &SqlitePool, notifier: &Notifier, now: DateTime<Utc>) -> Result<usize> {
    let (from, until) = reminder_window(now)?;
    let candidates = tasks::tasks_due_between(pool, from, until).await?;

    let mut sent = 0;
    for candidate in candidates {
        let Some(email) = candidate.assignee_email.as_deref().filter(|e| !e.is_empty()) else {
            debug!("Task {} has no reachable assignee, skipping reminder", candidate.task.id);
            continue;
        };

        // Flag first: a failed flag must not turn into a reminder every sweep.
        if let Err(e) = tasks::mark_reminded(pool, candidate.task.id).await {
            error!("Could not flag reminder for task {}: {:?}", candidate.task.id, e);
            continue;
        }

        let name = candidate.assignee_name.as_deref().unwrap_or("colleague");
        notifier.due_reminder(email, name, &candidate.task);
        sent += 1;
    }

    info!("Queued {} due-tomorrow reminders.", sent);
    Ok(sent)
}

/// Overdue marking followed by reminder dispatch.
pub async fn run_sweep(pool: &SqlitePool, notifier: &Notifier, now: DateTime<Utc>) -> Result<SweepReport> {
    let modified_count = mark_overdue(pool, now).await?;
    let reminders_sent = dispatch_reminders(pool, notifier, now).await?;
    Ok(SweepReport {
        modified_count,
        reminders_sent,
    })
}
