//! Router assembly: routes, fallback and the middleware chain

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::{
    api::{self, route_not_found},
    error::AppResult,
    middleware, AppState,
};

/// Create the application router with all routes and middleware.
///
/// Outermost first: security headers, tracing, CORS, rate limiting, panic
/// recovery, body limit, routes. Every response, errors included, passes
/// back through the security and CORS stages.
pub fn create_router(state: AppState) -> AppResult<Router> {
    let config = Arc::clone(&state.config);

    let router = Router::new()
        // Introspection
        .route("/", get(api::health::welcome).fallback(route_not_found))
        .route("/health", get(api::health::health_check).fallback(route_not_found))
        .route("/test-db", get(api::health::test_db).fallback(route_not_found))
        .route(
            "/api-docs/openapi.json",
            get(api::openapi::openapi_json).fallback(route_not_found),
        )
        // Books
        .route(
            "/api/books",
            get(api::books::list_books)
                .post(api::books::create_book)
                .fallback(route_not_found),
        )
        .route(
            "/api/books/:book_id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book)
                .fallback(route_not_found),
        )
        // Borrow
        .route(
            "/api/borrow",
            get(api::borrow::borrow_summary)
                .post(api::borrow::borrow_book)
                .fallback(route_not_found),
        )
        .fallback(route_not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body.limit_bytes))
        .layer(CatchPanicLayer::custom(middleware::handle_panic));

    let router = middleware::rate_limit::apply(router, &config.rate_limit)?
        .layer(middleware::cors::layer(&config.server, &config.cors))
        .layer(TraceLayer::new_for_http());

    Ok(middleware::security::apply(router))
}
