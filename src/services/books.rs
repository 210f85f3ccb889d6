//! Book catalog service

use mongodb::bson::{self, oid::ObjectId};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, BookView, CreateBook, UpdateBook},
    repository::Repository,
};

use super::parse_id;

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create_book(&self, request: CreateBook) -> AppResult<BookView> {
        let request = request.normalized();
        request.validate()?;

        let now = bson::DateTime::now();
        let book = Book {
            id: ObjectId::new(),
            available: request.available.unwrap_or(request.copies > 0),
            title: request.title,
            author: request.author,
            genre: request.genre,
            isbn: request.isbn,
            description: request.description,
            copies: request.copies,
            created_at: now,
            updated_at: now,
        };

        let created = self.repository.books.insert(book).await?;
        Ok(created.into())
    }

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<BookView>> {
        if query.limit() == 0 {
            return Err(AppError::Validation("limit must be at least 1".to_string()));
        }

        let books = self.repository.books.find(query).await?;
        Ok(books.into_iter().map(BookView::from).collect())
    }

    pub async fn get_book(&self, id: &str) -> AppResult<BookView> {
        let id = parse_id(id, "book")?;
        self.repository
            .books
            .get(id)
            .await?
            .map(BookView::from)
            .ok_or_else(not_found)
    }

    pub async fn update_book(&self, id: &str, changes: UpdateBook) -> AppResult<BookView> {
        let id = parse_id(id, "book")?;
        let changes = changes.normalized();
        changes.validate()?;
        if changes.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        self.repository
            .books
            .update(id, changes)
            .await?
            .map(BookView::from)
            .ok_or_else(not_found)
    }

    pub async fn delete_book(&self, id: &str) -> AppResult<()> {
        let id = parse_id(id, "book")?;
        if self.repository.books.delete(id).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Book not found".to_string())
}
