//! Borrow endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        borrow::{BorrowSummary, BorrowView, CreateBorrow},
        ApiResponse,
    },
    AppState,
};

use super::Payload;

/// Borrow copies of a book
#[utoipa::path(
    post,
    path = "/api/borrow",
    tag = "borrow",
    request_body(content = CreateBorrow, content_type = "application/json"),
    responses(
        (status = 201, description = "Borrow recorded", body = BorrowView),
        (status = 400, description = "Invalid borrow data", body = ErrorEnvelope),
        (status = 404, description = "Book not found", body = ErrorEnvelope),
        (status = 422, description = "Not enough copies available", body = ErrorEnvelope)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    Payload(request): Payload<CreateBorrow>,
) -> AppResult<(StatusCode, Json<ApiResponse<BorrowView>>)> {
    let borrow = state.services.borrow.borrow_book(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Book borrowed successfully", borrow)),
    ))
}

/// Total borrowed quantity per book
#[utoipa::path(
    get,
    path = "/api/borrow",
    tag = "borrow",
    responses(
        (status = 200, description = "Borrowed books summary", body = Vec<BorrowSummary>)
    )
)]
pub async fn borrow_summary(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<BorrowSummary>>>> {
    let summary = state.services.borrow.summary().await?;
    Ok(Json(ApiResponse::new(
        "Borrowed books summary retrieved successfully",
        summary,
    )))
}
