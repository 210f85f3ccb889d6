//! Book endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        book::{BookQuery, BookView, CreateBook, UpdateBook},
        ApiResponse,
    },
    AppState,
};

use super::{AppPath, AppQuery, Payload};

/// Create a book
#[utoipa::path(
    post,
    path = "/api/books",
    tag = "books",
    request_body(content = CreateBook, content_type = "application/json"),
    responses(
        (status = 201, description = "Book created", body = BookView),
        (status = 400, description = "Invalid book data", body = ErrorEnvelope),
        (status = 409, description = "ISBN already exists", body = ErrorEnvelope)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Payload(request): Payload<CreateBook>,
) -> AppResult<(StatusCode, Json<ApiResponse<BookView>>)> {
    let book = state.services.books.create_book(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Book created successfully", book)),
    ))
}

/// List books with optional genre filter, sorting and limit
#[utoipa::path(
    get,
    path = "/api/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "List of books", body = Vec<BookView>),
        (status = 400, description = "Invalid query parameters", body = ErrorEnvelope)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<BookQuery>,
) -> AppResult<Json<ApiResponse<Vec<BookView>>>> {
    let books = state.services.books.list_books(&query).await?;
    Ok(Json(ApiResponse::new("Books retrieved successfully", books)))
}

#[utoipa::path(
    get,
    path = "/api/books/{book_id}",
    tag = "books",
    params(("book_id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookView),
        (status = 400, description = "Malformed book ID", body = ErrorEnvelope),
        (status = 404, description = "Book not found", body = ErrorEnvelope)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AppPath(book_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<BookView>>> {
    let book = state.services.books.get_book(&book_id).await?;
    Ok(Json(ApiResponse::new("Book retrieved successfully", book)))
}

/// Update a book; setting copies recomputes availability
#[utoipa::path(
    put,
    path = "/api/books/{book_id}",
    tag = "books",
    params(("book_id" = String, Path, description = "Book ID")),
    request_body(content = UpdateBook, content_type = "application/json"),
    responses(
        (status = 200, description = "Book updated", body = BookView),
        (status = 400, description = "Invalid book data", body = ErrorEnvelope),
        (status = 404, description = "Book not found", body = ErrorEnvelope)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AppPath(book_id): AppPath<String>,
    Payload(changes): Payload<UpdateBook>,
) -> AppResult<Json<ApiResponse<BookView>>> {
    let book = state.services.books.update_book(&book_id, changes).await?;
    Ok(Json(ApiResponse::new("Book updated successfully", book)))
}

#[utoipa::path(
    delete,
    path = "/api/books/{book_id}",
    tag = "books",
    params(("book_id" = String, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 404, description = "Book not found", body = ErrorEnvelope)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AppPath(book_id): AppPath<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.books.delete_book(&book_id).await?;
    Ok(Json(ApiResponse::new("Book deleted successfully", ())))
}
