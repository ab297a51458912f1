// Workflow error taxonomy

use serde::Serialize;
use thiserror::Error;

use super::policy::Action;
use crate::documents::DocumentError;
use crate::domain::{RequestId, RequestState, UserId};
use crate::notifications::NotificationError;
use crate::store::{Entity, StoreError};

/// Stable, machine-readable classification of a [`WorkflowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidState,
    Forbidden,
    IllegalRegression,
    NotFound,
    Conflict,
    ConcurrentModification,
    InvalidInput,
    Document,
    Notification,
    Store,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::IllegalRegression => "illegal_regression",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ConcurrentModification => "concurrent_modification",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Document => "document",
            ErrorKind::Notification => "notification",
            ErrorKind::Store => "store",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid target state code {code}: expected 1 (pending), 2 (in progress) or 3 (completed)")]
    InvalidState { code: i64 },

    #[error("User {actor_id} is not allowed to {action}")]
    Forbidden { actor_id: UserId, action: Action },

    #[error("Request {request_id} cannot move back from {from} to {to}")]
    IllegalRegression {
        request_id: RequestId,
        from: RequestState,
        to: RequestState,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("A report already exists for request {request_id}")]
    Conflict { request_id: RequestId },

    #[error("Request {request_id} was modified concurrently; reload and retry")]
    ConcurrentModification { request_id: RequestId },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Document generation failed: {0}")]
    Document(#[from] DocumentError),

    #[error("Notification failed: {0}")]
    Notification(#[from] NotificationError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidState { .. } => ErrorKind::InvalidState,
            WorkflowError::Forbidden { .. } => ErrorKind::Forbidden,
            WorkflowError::IllegalRegression { .. } => ErrorKind::IllegalRegression,
            WorkflowError::NotFound { .. } => ErrorKind::NotFound,
            WorkflowError::Conflict { .. } => ErrorKind::Conflict,
            WorkflowError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            WorkflowError::InvalidInput { .. } => ErrorKind::InvalidInput,
            WorkflowError::Document(_) => ErrorKind::Document,
            WorkflowError::Notification(_) => ErrorKind::Notification,
            WorkflowError::Store(_) => ErrorKind::Store,
        }
    }

    pub(crate) fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        WorkflowError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => WorkflowError::NotFound { entity, id },
            StoreError::Duplicate {
                entity: Entity::Report,
                id,
            } => WorkflowError::Conflict { request_id: id },
            StoreError::VersionConflict { request_id, .. } => {
                WorkflowError::ConcurrentModification { request_id }
            }
            other => WorkflowError::Store(other),
        }
    }
}
