//! HTTP middleware stages wrapped around the router.
//!
//! - Security response headers
//! - CORS policy
//! - Per-client rate limiting
//! - Panic recovery

pub mod cors;
pub mod rate_limit;
pub mod security;

use std::any::Any;

use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Turn a handler panic into the JSON 500 envelope
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[tokio::test]
    async fn panic_becomes_json_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal server error");
    }
}
