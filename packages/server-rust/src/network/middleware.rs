//! HTTP layers wrapped around every route.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, warn, Span};

use super::config::NetworkConfig;

/// Header carrying the per-request id, set when the client omits it.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Applies the HTTP layers to `router`, outermost first: request id
/// assignment, an `http` trace span, gzip, CORS, a 504 request timeout, and
/// finally echoing the request id on the response.
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(http_span))
            .layer(CompressionLayer::new())
            .layer(cors_layer(&config.cors_origins))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

fn http_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    info_span!(
        "http",
        method = %request.method(),
        path = request.uri().path(),
        request_id,
    )
}

/// `"*"` anywhere in `origins` allows every origin. Unparseable origins are
/// skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}
