//! Data models for books and borrow records

pub mod book;
pub mod borrow;

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::Serialize;

/// Convert a stored timestamp to UTC
pub fn to_utc(value: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or_default()
}

/// Convert a UTC timestamp to its stored form
pub fn to_bson(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}

/// Success response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}
