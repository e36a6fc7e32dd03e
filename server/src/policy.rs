// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! The one place that decides whether a session may touch a resource.

use taskdesk_common::Role;
use tracing::warn;

use crate::auth::SessionUser;
use crate::handlers::AppError;

pub const HOD_ONLY: &[Role] = &[Role::Hod];
pub const STAFF_ONLY: &[Role] = &[Role::Staff];
pub const ANY_ROLE: &[Role] = &[Role::Hod, Role::Staff];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    RoleNotAllowed,
    CrossDepartment,
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Checks, in order: the session's role is allowed, the resource belongs to
/// the session's department, and the session owns the resource. Checks whose
/// input is `None` are skipped.
pub fn authorize(
    session: &SessionUser,
    allowed_roles: &[Role],
    resource_department: Option<i64>,
    resource_owner: Option<i64>,
) -> Decision {
    if !allowed_roles.contains(&session.role) {
        return Decision::Deny(DenyReason::RoleNotAllowed);
    }
    if resource_department.is_some_and(|dept| dept != session.department) {
        return Decision::Deny(DenyReason::CrossDepartment);
    }
    if resource_owner.is_some_and(|owner| owner != session.id) {
        return Decision::Deny(DenyReason::NotOwner);
    }
    Decision::Allow
}

impl Decision {
    /// Turns a denial into the matching HTTP error, using `message` for the
    /// 403 cases.
    pub fn or_deny(self, session: &SessionUser, message: &str) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                warn!(
                    "Denied {} {} (department {}): {:?}",
                    session.role, session.emp_id, session.department, reason
                );
                Err(match reason {
                    DenyReason::RoleNotAllowed => AppError::unauthorized(),
                    DenyReason::CrossDepartment | DenyReason::NotOwner => AppError::forbidden(message),
                })
            }
        }
    }
}

/// Role-only gate for routes with no resource to compare against yet.
pub fn require_role(session: &SessionUser, allowed_roles: &[Role]) -> Result<(), AppError> {
    authorize(session, allowed_roles, None, None).or_deny(session, "Forbidden")
}
