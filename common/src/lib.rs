// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of consecutive wrong passwords after which an HOD account locks.
pub const MAX_FAILED_LOGINS: i64 = 5;

/// How long a locked HOD account stays locked.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Minimum length accepted for a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// The two roles a session can carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    Hod,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Hod => "HOD",
            Role::Staff => "STAFF",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
            TaskPriority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(TaskPriority::Low),
            "MEDIUM" => Ok(TaskPriority::Medium),
            "HIGH" => Ok(TaskPriority::High),
            "URGENT" => Ok(TaskPriority::Urgent),
            other => Err(format!("Invalid priority: {}", other)),
        }
    }
}

/// Lifecycle state of a task.
///
/// `Overdue` is only ever entered by the sweep; see [`TaskStatus::can_transition`]
/// for the edges a person may take.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Overdue,
        TaskStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Overdue => "OVERDUE",
            TaskStatus::Rejected => "REJECTED",
        }
    }

    /// Whether `role` may move a task from `self` to `to`.
    ///
    /// Writing the current status back is always accepted. Nobody may set
    /// `Overdue` by hand.
    pub fn can_transition(&self, to: TaskStatus, role: Role) -> bool {
        use TaskStatus::*;

        if *self == to {
            return true;
        }

        match role {
            Role::Hod => matches!(
                (*self, to),
                (Pending, InProgress)
                    | (Pending, Completed)
                    | (Pending, Rejected)
                    | (InProgress, Pending)
                    | (InProgress, Completed)
                    | (InProgress, Rejected)
                    | (Overdue, Pending)
                    | (Overdue, InProgress)
                    | (Overdue, Completed)
                    | (Overdue, Rejected)
                    | (Completed, InProgress)
                    | (Rejected, Pending)
            ),
            Role::Staff => matches!(
                (*self, to),
                (Pending, InProgress)
                    | (Pending, Rejected)
                    | (InProgress, Completed)
                    | (Overdue, InProgress)
                    | (Overdue, Completed)
            ),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid status: {}", s))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub description: String,
    pub is_active: bool,
}

/// A head of department. Owns the staff and tasks of one department.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Hod {
    pub id: i64,
    pub name: String,
    pub emp_id: String,
    pub email: String,
    pub department_id: i64,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub failed_login_attempts: i64,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A staff account. Secret columns are never serialized.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: i64,
    pub emp_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department_id: i64,
    pub role: Role,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub required_change_password: bool,
    #[serde(default, skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_reset_valid: bool,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_reset_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A task row.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub department_id: i64,
    pub assigned_to: i64,
    pub assigned_by: i64,
    pub due_date: DateTime<Utc>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task joined with the people on both ends, as listed by `GET /task`.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,
    pub assignee_name: Option<String>,
    pub assignee_emp_id: Option<String>,
    pub assignee_email: Option<String>,
    pub assigner_name: Option<String>,
    pub assigner_emp_id: Option<String>,
}

/// Body of `POST /task`. Every field is optional at the wire level so that
/// missing fields are reported as validation errors rather than decode failures.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<i64>,
    pub assigned_to: Option<i64>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// Body of `PUT /task`. Omitted fields keep their stored value.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<i64>,
    pub assigned_to: Option<i64>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
}

/// Body of `PATCH /task/status`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusPayload {
    pub id: i64,
    pub status: String,
}

/// Body of `POST /staff`.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffPayload {
    pub emp_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmpIdPayload {
    pub emp_id: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub emp_id: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

/// Body of `POST /staff/reset-password`. The token may arrive as `token` or `ref`.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ResetPasswordPayload {
    pub token: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub password: Option<String>,
}

impl ResetPasswordPayload {
    pub fn token(&self) -> Option<&str> {
        fn present(t: &Option<String>) -> Option<&str> {
            t.as_deref().filter(|t| !t.is_empty())
        }
        present(&self.token).or_else(|| present(&self.reference))
    }
}

/// Per-status task counts of one department.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub overdue: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StaffCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

/// One row of the per-staff workload distribution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StaffWorkload {
    pub staff_id: i64,
    pub name: Option<String>,
    pub emp_id: Option<String>,
    pub total: i64,
    pub completed: i64,
    pub overdue: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub efficiency: i64,
    pub overdue_rate: i64,
}

impl Performance {
    /// Derives both percentages from the task counts. An empty department
    /// scores zero on both.
    pub fn from_counts(counts: &TaskCounts) -> Self {
        Self {
            efficiency: percentage(counts.completed, counts.total),
            overdue_rate: percentage(counts.overdue, counts.total),
        }
    }
}

fn percentage(part: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as i64
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DepartmentSummary {
    pub name: String,
    pub code: String,
}

/// Response body of `GET /dashboard`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Dashboard {
    pub department: Option<DepartmentSummary>,
    pub tasks: TaskCounts,
    pub staff: StaffCounts,
    pub distribution: Vec<StaffWorkload>,
    pub performance: Performance,
}

/// Parses a due date the way browsers hand them over: RFC 3339, a bare
/// local timestamp (taken as UTC), or a plain date (midnight UTC).
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        assert_eq!("IN_PROGRESS".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!(TaskStatus::Overdue.to_string(), "OVERDUE");
        assert!("DONE".parse::<TaskStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert!("urgent".parse::<TaskPriority>().is_err());
        assert_eq!("URGENT".parse::<TaskPriority>(), Ok(TaskPriority::Urgent));
    }

    #[test]
    fn nobody_sets_overdue_by_hand() {
        for from in TaskStatus::ALL {
            if from == TaskStatus::Overdue {
                continue;
            }
            assert!(!from.can_transition(TaskStatus::Overdue, Role::Hod));
            assert!(!from.can_transition(TaskStatus::Overdue, Role::Staff));
        }
    }

    #[test]
    fn hod_may_reopen_overdue_task() {
        assert!(TaskStatus::Overdue.can_transition(TaskStatus::Pending, Role::Hod));
        assert!(!TaskStatus::Overdue.can_transition(TaskStatus::Pending, Role::Staff));
    }

    #[test]
    fn staff_walk_their_task_forward_only() {
        assert!(TaskStatus::Pending.can_transition(TaskStatus::InProgress, Role::Staff));
        assert!(TaskStatus::InProgress.can_transition(TaskStatus::Completed, Role::Staff));
        assert!(!TaskStatus::Completed.can_transition(TaskStatus::InProgress, Role::Staff));
        assert!(!TaskStatus::Rejected.can_transition(TaskStatus::Pending, Role::Staff));
    }

    #[test]
    fn same_status_is_always_accepted() {
        for status in TaskStatus::ALL {
            assert!(status.can_transition(status, Role::Hod));
            assert!(status.can_transition(status, Role::Staff));
        }
    }

    #[test]
    fn reset_token_falls_back_to_ref() {
        let payload: ResetPasswordPayload =
            serde_json::from_value(serde_json::json!({ "token": "", "ref": "abc" })).unwrap();
        assert_eq!(payload.token(), Some("abc"));

        let payload: ResetPasswordPayload =
            serde_json::from_value(serde_json::json!({ "token": "xyz", "ref": "abc" })).unwrap();
        assert_eq!(payload.token(), Some("xyz"));

        assert_eq!(ResetPasswordPayload::default().token(), None);
    }

    #[test]
    fn empty_department_scores_zero() {
        let perf = Performance::from_counts(&TaskCounts::default());
        assert_eq!(perf, Performance { efficiency: 0, overdue_rate: 0 });
    }

    #[test]
    fn percentages_are_rounded() {
        let counts = TaskCounts {
            total: 3,
            completed: 2,
            pending: 0,
            in_progress: 0,
            overdue: 1,
        };
        let perf = Performance::from_counts(&counts);
        assert_eq!(perf.efficiency, 67);
        assert_eq!(perf.overdue_rate, 33);
    }

    #[test]
    fn due_dates_in_common_shapes_parse() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_due_date("2026-03-01"), Some(midnight));
        assert_eq!(parse_due_date("2026-03-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_due_date("2026-03-01T05:30:00+05:30"), Some(midnight));
        assert_eq!(
            parse_due_date("2026-03-01T10:15"),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 10, 15, 0).unwrap())
        );
        assert_eq!(parse_due_date("next tuesday"), None);
    }

    #[test]
    fn reset_payload_accepts_either_token_key() {
        let by_ref: ResetPasswordPayload =
            serde_json::from_str(r#"{"ref":"abc","password":"longenough"}"#).unwrap();
        assert_eq!(by_ref.token(), Some("abc"));

        let empty: ResetPasswordPayload = serde_json::from_str(r#"{"token":""}"#).unwrap();
        assert_eq!(empty.token(), None);
    }
}
