//! Service-level error kinds surfaced to callers.
//!
//! # Invariants
//! - `user_message` never includes storage details or identifiers.
//! - Ownership failures are reported as `Forbidden` whichever guard tripped.

use crate::config::PolicyError;
use crate::model::request::{RequestStatus, TransitionError};
use crate::model::UnknownVariant;
use crate::repo::RepoError;
use crate::schedule::{ConflictError, ScheduleError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// No session, or the caller's role may not run this operation.
    Unauthorized,
    /// Authenticated but not entitled to the resource.
    Forbidden,
    NotFound {
        entity: &'static str,
        id: Uuid,
    },
    /// Malformed or out-of-range input.
    Validation(String),
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    /// Completion attempted on a `done`/`cancelled` request.
    AlreadyClosed(RequestStatus),
    InvalidDate(String),
    /// Storage failure; aborts the operation.
    Storage(RepoError),
}

impl ServiceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for logs and API envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AlreadyClosed(_) => "already_closed",
            Self::InvalidDate(_) => "invalid_date",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Short message safe to show to the acting user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Please sign in with an account allowed to do this.",
            Self::Forbidden => "You do not have access to this resource.",
            Self::NotFound { .. } => "The requested item was not found.",
            Self::Validation(_) => "Some of the submitted values are invalid.",
            Self::InvalidTransition { .. } => "This request cannot change to that status now.",
            Self::AlreadyClosed(_) => "This request is already closed.",
            Self::InvalidDate(_) => "The date could not be understood.",
            Self::Storage(_) => "The operation failed. Please try again.",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(message) => write!(f, "validation error: {message}"),
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid transition from {from} to {to}")
            }
            Self::AlreadyClosed(status) => write!(f, "request already closed ({status})"),
            Self::InvalidDate(detail) => write!(f, "invalid date: {detail}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

impl From<TransitionError> for ServiceError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            TransitionError::AlreadyClosed(status) => Self::AlreadyClosed(status),
        }
    }
}

impl From<ScheduleError> for ServiceError {
    fn from(value: ScheduleError) -> Self {
        match value {
            ScheduleError::InvalidDate(detail) => Self::InvalidDate(detail),
            ScheduleError::InvalidInterval(months) => Self::Validation(format!(
                "service interval must be at least 1 month, got {months}"
            )),
        }
    }
}

impl From<ConflictError> for ServiceError {
    fn from(value: ConflictError) -> Self {
        match value {
            ConflictError::Window(err) => Self::from(err),
            ConflictError::Repo(err) => Self::from(err),
        }
    }
}

impl From<PolicyError> for ServiceError {
    fn from(value: PolicyError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<UnknownVariant> for ServiceError {
    fn from(value: UnknownVariant) -> Self {
        Self::Validation(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::config::PolicyError;
use crate::model::request::{RequestStatus, TransitionError};
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = ServiceError::from(RepoError::NotFound {
            entity: "device",
            id,
        });
        assert!(matches!(err, ServiceError::NotFound { entity: "device", .. }));
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn transition_errors_keep_their_kind() {
        let closed = ServiceError::from(TransitionError::AlreadyClosed(RequestStatus::Done));
        assert_eq!(closed.code(), "already_closed");
        let invalid = ServiceError::from(TransitionError::InvalidTransition {
            from: RequestStatus::Done,
            to: RequestStatus::InProgress,
        });
        assert_eq!(invalid.code(), "invalid_transition");
    }

    #[test]
    fn user_messages_do_not_leak_storage_details() {
        let err = ServiceError::from(RepoError::InvalidData(
            "invalid uuid `x` in devices.id".to_string(),
        ));
        assert!(!err.user_message().contains("devices"));
        assert!(err.to_string().contains("devices.id"));
    }
}
