//! Error types and the uniform JSON error envelope

use std::time::Duration;

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{header::RETRY_AFTER, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mongodb::error::{ErrorKind, WriteFailure};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Duplicate key error code reported by the store
const DUPLICATE_KEY: i32 = 11000;

/// Fault categories every error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Validation,
    NotFound,
    Store,
    RateLimit,
    Unclassified,
}

impl FaultKind {
    /// Status used when a fault has no more specific one
    pub fn default_status(self) -> StatusCode {
        match self {
            FaultKind::Validation => StatusCode::BAD_REQUEST,
            FaultKind::NotFound => StatusCode::NOT_FOUND,
            FaultKind::Store | FaultKind::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
            FaultKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),

    #[error("Invalid form body: {0}")]
    Form(#[from] FormRejection),

    #[error("Invalid query string: {0}")]
    Query(#[from] QueryRejection),

    #[error("Invalid path: {0}")]
    Path(#[from] PathRejection),

    #[error("Too many parameters (limit {0})")]
    TooManyParameters(usize),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("Database error: {0}")]
    Database(mongodb::error::Error),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Database operation timed out after {0:?}")]
    DatabaseTimeout(Duration),

    #[error("Too many requests")]
    RateLimited { retry_after: Option<u64> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    /// Always `false`
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppError {
    pub fn kind(&self) -> FaultKind {
        match self {
            AppError::Validation(_)
            | AppError::Json(_)
            | AppError::Form(_)
            | AppError::Query(_)
            | AppError::Path(_)
            | AppError::TooManyParameters(_)
            | AppError::BusinessRule(_)
            | AppError::Conflict(_) => FaultKind::Validation,
            AppError::NotFound(_) | AppError::RouteNotFound { .. } => FaultKind::NotFound,
            AppError::Database(_)
            | AppError::DatabaseUnavailable(_)
            | AppError::DatabaseTimeout(_) => FaultKind::Store,
            AppError::RateLimited { .. } => FaultKind::RateLimit,
            AppError::Internal(_) => FaultKind::Unclassified,
        }
    }

    /// Status for this fault; the kind decides unless a variant is more specific
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Json(rejection) => rejection.status(),
            AppError::Form(rejection) => rejection.status(),
            AppError::Query(rejection) => rejection.status(),
            AppError::Path(rejection) => rejection.status(),
            AppError::TooManyParameters(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => self.kind().default_status(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let (message, error) = match self {
            AppError::Validation(msg) => ("Validation failed".to_string(), Some(msg.clone())),
            AppError::Json(rejection) => {
                ("Invalid request body".to_string(), Some(rejection.body_text()))
            }
            AppError::Form(rejection) => {
                ("Invalid request body".to_string(), Some(rejection.body_text()))
            }
            AppError::Query(rejection) => {
                ("Invalid query parameters".to_string(), Some(rejection.body_text()))
            }
            AppError::Path(rejection) => {
                ("Invalid path parameters".to_string(), Some(rejection.body_text()))
            }
            AppError::TooManyParameters(_) => {
                ("Invalid request body".to_string(), Some(self.to_string()))
            }
            AppError::BusinessRule(msg) | AppError::Conflict(msg) | AppError::NotFound(msg) => {
                (msg.clone(), None)
            }
            AppError::RouteNotFound { .. } => {
                ("Route not found".to_string(), Some(self.to_string()))
            }
            AppError::Database(_) => ("Database error".to_string(), None),
            AppError::DatabaseUnavailable(msg) => {
                ("Database unavailable".to_string(), Some(msg.clone()))
            }
            AppError::DatabaseTimeout(_) => {
                ("Database operation timed out".to_string(), Some(self.to_string()))
            }
            AppError::RateLimited { .. } => (
                "Too many requests, please try again later.".to_string(),
                None,
            ),
            AppError::Internal(_) => ("Internal server error".to_string(), None),
        };

        ErrorEnvelope {
            success: false,
            message,
            error,
        }
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        let classified = match err.kind.as_ref() {
            // insert reports a write error, findAndModify a command error
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
                Some(duplicate_key())
            }
            ErrorKind::Command(command) if command.code == DUPLICATE_KEY => Some(duplicate_key()),
            ErrorKind::ServerSelection { message, .. } => {
                Some(AppError::DatabaseUnavailable(message.clone()))
            }
            _ => None,
        };
        classified.unwrap_or(AppError::Database(err))
    }
}

fn duplicate_key() -> AppError {
    AppError::Conflict("A record with the same unique value already exists".into())
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            _ if status.is_server_error() => tracing::warn!("{}", self),
            _ => tracing::debug!("{}", self),
        }

        let mut response = (status, Json(self.envelope())).into_response();
        if let AppError::RateLimited {
            retry_after: Some(secs),
        } = self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use mongodb::error::CommandError;

    use super::*;

    #[test]
    fn route_not_found_envelope_names_method_and_path() {
        let err = AppError::RouteNotFound {
            method: Method::DELETE,
            path: "/api/unknown".into(),
        };
        let envelope = err.envelope();

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), FaultKind::NotFound);
        assert!(!envelope.success);
        assert_eq!(envelope.message, "Route not found");
        assert_eq!(envelope.error.as_deref(), Some("Cannot DELETE /api/unknown"));
    }

    #[test]
    fn store_faults_hide_driver_details() {
        let err = AppError::DatabaseTimeout(Duration::from_secs(45));
        assert_eq!(err.kind(), FaultKind::Store);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let internal = AppError::Internal("boom".into());
        assert_eq!(internal.kind(), FaultKind::Unclassified);
        assert_eq!(internal.envelope().error, None);
    }

    #[test]
    fn duplicate_key_from_find_and_modify_is_conflict() {
        let command: CommandError = mongodb::bson::from_document(mongodb::bson::doc! {
            "code": DUPLICATE_KEY,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: library.books index: isbn_1",
        })
        .unwrap();
        let err = AppError::from(mongodb::error::Error::from(ErrorKind::Command(command)));

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), FaultKind::Validation);
    }

    #[test]
    fn other_command_errors_stay_store_faults() {
        let command: CommandError = mongodb::bson::from_document(mongodb::bson::doc! {
            "code": 13,
            "codeName": "Unauthorized",
            "errmsg": "not authorized",
        })
        .unwrap();
        let err = AppError::from(mongodb::error::Error::from(ErrorKind::Command(command)));

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.envelope().error, None);
    }

    #[test]
    fn status_follows_fault_kind() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            FaultKind::Validation.default_status()
        );
        assert_eq!(
            AppError::NotFound("Book not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RateLimited { retry_after: None }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::TooManyParameters(1000).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = AppError::RateLimited {
            retry_after: Some(9),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "9");
    }

    #[test]
    fn envelope_omits_missing_error_field() {
        let json = serde_json::to_value(AppError::NotFound("Book not found".into()).envelope())
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "Book not found" })
        );
    }
}
