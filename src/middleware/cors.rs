//! CORS policy gated on the deployment mode

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::{CorsConfig, RunMode, ServerConfig};

/// Production accepts the allow-list only; any other mode reflects the origin.
///
/// Credentials are allowed in both modes. Disallowed origins get no CORS
/// headers and the browser blocks the response.
pub fn layer(server: &ServerConfig, cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match server.mode() {
        RunMode::Production => layer.allow_origin(AllowOrigin::list(allowed_origins(cors))),
        RunMode::Development => layer.allow_origin(AllowOrigin::mirror_request()),
    }
}

/// Configured origins compared byte for byte; `*` patterns are not expanded
pub fn allowed_origins(cors: &CorsConfig) -> Vec<HeaderValue> {
    cors.allowed_origins
        .iter()
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| *origin != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}
