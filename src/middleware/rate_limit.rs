//! Per-client-address rate limiting

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::{
    config::RateLimitConfig,
    error::{AppError, AppResult},
};

/// Interval after which one request of the quota is restored
pub fn replenish_period(config: &RateLimitConfig) -> AppResult<Duration> {
    if config.max_requests == 0 || config.window_secs == 0 {
        return Err(AppError::Internal(
            "rate limit window and max requests must be positive".to_string(),
        ));
    }
    Ok(config.window() / config.max_requests)
}

/// Limit requests per peer address.
///
/// Every address may burst up to `max_requests`; the quota refills one
/// request per `window / max_requests`. The layer borrows its configuration
/// for `'static`, so each call leaks one limiter; build the router once.
pub fn apply(router: Router, config: &RateLimitConfig) -> AppResult<Router> {
    let period = replenish_period(config)?;
    let governor = GovernorConfigBuilder::default()
        .per_millisecond(u64::try_from(period.as_millis()).unwrap_or(u64::MAX))
        .burst_size(config.max_requests)
        .finish()
        .ok_or_else(|| AppError::Internal("invalid rate limit quota".to_string()))?;
    let governor: &'static _ = Box::leak(Box::new(governor));

    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        let limiter = governor.limiter().clone();
        let window = config.window();
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(window);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.retain_recent();
                tracing::trace!("Pruned idle rate limit keys");
            }
        });
    }

    Ok(router
        .layer(GovernorLayer { config: governor })
        .layer(middleware::map_response(into_envelope)))
}

/// Rewrite the limiter's plain-text rejections into the error envelope
async fn into_envelope(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        return response;
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            tracing::warn!(?retry_after, "Rate limit exceeded");
            AppError::RateLimited { retry_after }.into_response()
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            AppError::Internal("rate limiter could not identify the client".to_string())
                .into_response()
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quota_refills_every_nine_seconds() {
        let period = replenish_period(&RateLimitConfig::default()).unwrap();
        assert_eq!(period, Duration::from_secs(9));
    }

    #[test]
    fn zero_quota_is_rejected() {
        let config = RateLimitConfig {
            window_secs: 60,
            max_requests: 0,
        };
        assert!(replenish_period(&config).is_err());
    }

    #[tokio::test]
    async fn plain_rejection_becomes_envelope() {
        let plain = (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, "9")],
            "Too Many Requests! Wait for 9s",
        )
            .into_response();

        let response = into_envelope(plain).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "9");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn json_responses_pass_through() {
        let original = AppError::Internal("x".into()).into_response();
        let response = into_envelope(original).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
