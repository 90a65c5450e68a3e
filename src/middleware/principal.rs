//! Authorization principal.
//! The identity provider in front of this service authenticates the session
//! and asserts the account's id, role and approval state via trusted
//! headers (stripped from client traffic at the edge). Handlers receive the
//! result as a typed extractor instead of re-fetching a profile per call.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const APPROVAL_STATUS_HEADER: &str = "x-approval-status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Writer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Writer => "writer",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "writer" => Some(Role::Writer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

/// The authenticated caller, as asserted by the identity provider.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub role: Role,
    pub approval: ApprovalStatus,
}

impl Principal {
    pub fn require_approved(&self) -> Result<(), AppError> {
        if self.approval != ApprovalStatus::Approved {
            return Err(AppError::Forbidden("Approval required".to_string()));
        }
        Ok(())
    }

    /// Approved account with exactly this role; the precondition for every
    /// initiator operation.
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        self.require_approved()?;
        if self.role != role {
            return Err(AppError::Forbidden(format!(
                "{} role required",
                role.as_str()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
        };

        let account_id = header(USER_ID_HEADER)
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

        let role = header(USER_ROLE_HEADER)
            .and_then(Role::parse)
            .ok_or_else(|| AppError::Forbidden("Profile missing".to_string()))?;

        let approval = header(APPROVAL_STATUS_HEADER)
            .and_then(ApprovalStatus::parse)
            .unwrap_or(ApprovalStatus::Pending);

        Ok(Principal {
            account_id,
            role,
            approval,
        })
    }
}
