//! Router assembly: endpoints plus the HTTP policy every response shares.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::Response,
    routing::{get, options},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};

/// Largest accepted request body. A contact form never comes close.
///
/// Enforced inside the body extractor so an oversized POST is answered by
/// the handler's own error mapping.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";
pub const CORS_MAX_AGE: &str = "86400";

/// Per-IP request budget.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst: u32,
}

/// Builds the application router.
///
/// With `rate_limit` set, the server must be started with connect-info so
/// the limiter can fall back to the peer address.
pub fn build_router(state: Arc<AppState>, rate_limit: Option<RateLimit>) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route(
            "/api/storeLeads",
            options(handlers::lead_preflight)
                .get(handlers::lead_api_status)
                .post(handlers::store_lead)
                .head(handlers::method_not_allowed)
                .fallback(handlers::method_not_allowed),
        )
        .route("/api/test", get(handlers::hello))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    if let Some(limit) = rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        router = router
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .layer(middleware::map_response(json_rate_limit_response));
    }

    // CORS headers go outside the limiter so 429s carry them too
    Ok(router
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(CORS_MAX_AGE),
        ))
        .layer(TraceLayer::new_for_http()))
}

/// Rewrites the limiter's plain-text 429 into the `{success, error}` shape
/// the form understands, keeping its status and retry headers.
async fn json_rate_limit_response<B>(response: Response<B>) -> Response<B>
where
    B: From<String>,
{
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let body = json!({
        "success": false,
        "error": "Too many requests",
    })
    .to_string();

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, B::from(body))
}
