//! API handlers for the library REST endpoints

pub mod books;
pub mod borrow;
pub mod form;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, OriginalUri, Path, Query, Request},
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request body accepted as JSON or URL-encoded form.
///
/// Form keys support nested syntax (see [`form::nest`]).
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(req.headers()) {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state).await?;
            if pairs.len() > form::MAX_PARAMETERS {
                return Err(AppError::TooManyParameters(form::MAX_PARAMETERS));
            }
            let value = form::nest(pairs);
            return serde_json::from_value(value)
                .map(Payload)
                .map_err(|e| AppError::Validation(e.to_string()));
        }

        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Payload(value))
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

/// Query string extractor answering with the JSON error envelope
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Path extractor answering with the JSON error envelope
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Fallback for every unmatched method and path
pub async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    AppError::RouteNotFound { method, path }
}
