//! Business logic services

pub mod books;
pub mod borrow;

use mongodb::bson::oid::ObjectId;

use crate::{
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub borrow: borrow::BorrowService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        Self {
            books: books::BooksService::new(repository.clone()),
            borrow: borrow::BorrowService::new(repository),
        }
    }
}

/// Parse a document ID taken from a request
pub fn parse_id(value: &str, entity: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(value.trim())
        .map_err(|_| AppError::Validation(format!("Invalid {} id: {}", entity, value)))
}
