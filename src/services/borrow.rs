//! Borrowing service

use mongodb::bson::{self, oid::ObjectId};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{Borrow, BorrowSummary, BorrowView, CreateBorrow},
        to_bson,
    },
    repository::Repository,
};

use super::parse_id;

#[derive(Clone)]
pub struct BorrowService {
    repository: Repository,
}

impl BorrowService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow copies of a book and record the loan
    pub async fn borrow_book(&self, request: CreateBorrow) -> AppResult<BorrowView> {
        request.validate()?;
        let book_id = parse_id(&request.book, "book")?;

        let book = self
            .repository
            .books
            .get(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.copies < request.quantity {
            return Err(not_enough_copies());
        }

        // a concurrent borrow may have taken the copies since the read
        self.repository
            .books
            .take_copies(book_id, request.quantity)
            .await?
            .ok_or_else(not_enough_copies)?;

        let now = bson::DateTime::now();
        let borrow = Borrow {
            id: ObjectId::new(),
            book: book_id,
            quantity: request.quantity,
            due_date: to_bson(request.due_date),
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.borrows.insert(borrow).await?;
        Ok(created.into())
    }

    pub async fn summary(&self) -> AppResult<Vec<BorrowSummary>> {
        self.repository.borrows.summary().await
    }
}

fn not_enough_copies() -> AppError {
    AppError::BusinessRule("Not enough copies available".to_string())
}
