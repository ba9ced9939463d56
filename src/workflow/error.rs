use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::model::{LeaveRequestId, LeaveStatus, UserId};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("leave request {id} is already {status}")]
    InvalidState {
        id: LeaveRequestId,
        status: LeaveStatus,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("notification recipient {0} does not exist")]
    UnknownRecipient(UserId),
    #[error("no manager, supervisor or admin is available to notify")]
    NoRecipient,
    #[error("collaborator unavailable: {0}")]
    Transient(String),
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::InvalidState { .. } => "invalid_state",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::UnknownRecipient(_) => "unknown_recipient",
            WorkflowError::NoRecipient => "no_recipient",
            WorkflowError::Transient(_) => "unavailable",
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        WorkflowError::Transient(e.to_string())
    }
}

impl ResponseError for WorkflowError {
    fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::NotFound { .. } | WorkflowError::UnknownRecipient(_) => {
                StatusCode::NOT_FOUND
            }
            WorkflowError::InvalidState { .. } | WorkflowError::NoRecipient => {
                StatusCode::CONFLICT
            }
            WorkflowError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // collaborator details stay in the log
        let message = match self {
            WorkflowError::Transient(_) => "Service temporarily unavailable".to_owned(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            WorkflowError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WorkflowError::InvalidState {
                id: LeaveRequestId(4),
                status: LeaveStatus::Approved
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            WorkflowError::Transient("db down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn invalid_state_message_names_current_status() {
        let err = WorkflowError::InvalidState {
            id: LeaveRequestId(4),
            status: LeaveStatus::Rejected,
        };
        assert_eq!(err.to_string(), "leave request 4 is already rejected");
    }
}
