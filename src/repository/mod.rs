//! Repository layer for store operations

pub mod books;
pub mod borrows;

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::{
    database::Connector,
    error::AppResult,
    models::{
        book::{Book, BookQuery, UpdateBook},
        borrow::{Borrow, BorrowSummary},
    },
};

/// Store operations on books
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn insert(&self, book: Book) -> AppResult<Book>;

    async fn find(&self, query: &BookQuery) -> AppResult<Vec<Book>>;

    async fn get(&self, id: ObjectId) -> AppResult<Option<Book>>;

    async fn update(&self, id: ObjectId, changes: UpdateBook) -> AppResult<Option<Book>>;

    /// Returns whether a book was deleted
    async fn delete(&self, id: ObjectId) -> AppResult<bool>;

    /// Atomically remove `quantity` copies and recompute availability.
    ///
    /// `None` when the book is missing or has fewer copies.
    async fn take_copies(&self, id: ObjectId, quantity: u32) -> AppResult<Option<Book>>;
}

/// Store operations on borrow records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowRepository: Send + Sync {
    async fn insert(&self, borrow: Borrow) -> AppResult<Borrow>;

    /// Borrowed quantity grouped by book
    async fn summary(&self) -> AppResult<Vec<BorrowSummary>>;
}

/// Main repository struct holding the store-backed repositories
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
    pub borrows: Arc<dyn BorrowRepository>,
}

impl Repository {
    /// Create MongoDB repositories sharing the given connector
    pub fn new(connector: Connector) -> Self {
        Self {
            books: Arc::new(books::MongoBookRepository::new(connector.clone())),
            borrows: Arc::new(borrows::MongoBorrowRepository::new(connector)),
        }
    }

    pub fn from_parts(books: Arc<dyn BookRepository>, borrows: Arc<dyn BorrowRepository>) -> Self {
        Self { books, borrows }
    }
}
