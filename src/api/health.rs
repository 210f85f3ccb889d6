//! Health, welcome and store status endpoints

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    database::ConnectionStatus,
    error::{AppError, AppResult},
    AppState,
};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    /// ISO-8601 time of the check
    pub timestamp: String,
    /// Deployment mode name
    pub environment: String,
}

/// Endpoint map advertised by the welcome route
#[derive(Serialize, ToSchema)]
pub struct Endpoints {
    pub health: String,
    #[serde(rename = "test-db")]
    pub test_db: String,
    pub books: String,
    pub borrow: String,
    pub docs: String,
}

#[derive(Serialize, ToSchema)]
pub struct WelcomeResponse {
    pub success: bool,
    pub message: String,
    pub endpoints: Endpoints,
    pub timestamp: String,
}

#[derive(Serialize, ToSchema)]
pub struct DatabaseTestResponse {
    pub success: bool,
    pub message: String,
    pub database: ConnectionStatus,
    pub timestamp: String,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Liveness check; never touches the store
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Library Management API is running".to_string(),
        timestamp: timestamp(),
        environment: state.config.server.environment.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Welcome message and endpoint map", body = WelcomeResponse)
    )
)]
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        success: true,
        message: "Library Management API - Welcome!".to_string(),
        endpoints: Endpoints {
            health: "/health".to_string(),
            test_db: "/test-db".to_string(),
            books: "/api/books".to_string(),
            borrow: "/api/borrow".to_string(),
            docs: "/api-docs/openapi.json".to_string(),
        },
        timestamp: timestamp(),
    })
}

/// Report the store connection state
#[utoipa::path(
    get,
    path = "/test-db",
    tag = "health",
    responses(
        (status = 200, description = "Store is connected", body = DatabaseTestResponse),
        (status = 503, description = "Store is not connected", body = ErrorEnvelope)
    )
)]
pub async fn test_db(State(state): State<AppState>) -> AppResult<Json<DatabaseTestResponse>> {
    let status = state.connector.status().await;
    if !status.connected {
        return Err(AppError::DatabaseUnavailable(format!(
            "connection is {}",
            status.state
        )));
    }

    Ok(Json(DatabaseTestResponse {
        success: true,
        message: "Database connection test".to_string(),
        database: status,
        timestamp: timestamp(),
    }))
}
