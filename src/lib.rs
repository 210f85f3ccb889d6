//! Library Management API
//!
//! REST JSON API for a book catalog and borrow records stored in MongoDB,
//! behind a fixed middleware chain (security headers, CORS, rate limiting,
//! body parsing) with a single JSON error contract.

use std::sync::Arc;

pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;
pub mod shutdown;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    /// Read-only view of the store connection
    pub connector: database::Connector,
}

impl AppState {
    /// Wire MongoDB-backed services over the given connector
    pub fn new(config: AppConfig, connector: database::Connector) -> Self {
        let repository = repository::Repository::new(connector.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(services::Services::new(repository)),
            connector,
        }
    }
}
