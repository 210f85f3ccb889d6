//! OpenAPI documentation

use axum::Json;
use utoipa::OpenApi;

use crate::{
    api::{books, borrow, health},
    database::{ConnectionState, ConnectionStatus},
    error::ErrorEnvelope,
    models::{
        book::{BookSortField, BookView, CreateBook, Genre, SortOrder, UpdateBook},
        borrow::{BookRef, BorrowSummary, BorrowView, CreateBorrow},
    },
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Management API",
        version = "1.0.0",
        description = "Books and borrow records over a document store"
    ),
    paths(
        // Health
        health::health_check,
        health::welcome,
        health::test_db,
        // Books
        books::create_book,
        books::list_books,
        books::get_book,
        books::update_book,
        books::delete_book,
        // Borrow
        borrow::borrow_book,
        borrow::borrow_summary,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::Endpoints,
            health::WelcomeResponse,
            health::DatabaseTestResponse,
            ConnectionStatus,
            ConnectionState,
            ErrorEnvelope,
            Genre,
            BookSortField,
            SortOrder,
            BookView,
            CreateBook,
            UpdateBook,
            BookRef,
            BorrowView,
            CreateBorrow,
            BorrowSummary,
        )
    ),
    tags(
        (name = "health", description = "Service status"),
        (name = "books", description = "Book catalog"),
        (name = "borrow", description = "Borrow records")
    )
)]
pub struct ApiDoc;

/// Serve the generated document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/health",
            "/test-db",
            "/api/books",
            "/api/books/{book_id}",
            "/api/borrow",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
