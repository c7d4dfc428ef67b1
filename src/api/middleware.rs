//! Layers wrapped around every route.
//!
//! Outermost first: request logging (with request id), CORS, panic catching.
//! Unmatched routes fall through to the dashboard bundle.

use std::{any::Any, net::SocketAddr, path::Path, time::Instant};

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request},
    http::{
        header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN, USER_AGENT},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
};
use tracing::{error, info};
use uuid::Uuid;

use super::auth::API_KEY_HEADER;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");
const REQUESTED_WITH_HEADER: HeaderName = HeaderName::from_static("x-requested-with");

// ---------------------------------------------------------------------------
// Request logging
// ---------------------------------------------------------------------------

/// Tags the request with an id (reusing an inbound `X-Request-Id`), echoes
/// it on the response and logs one line per completed request.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = header_str(&req, &REQUEST_ID_HEADER)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user_agent = header_str(&req, &USER_AGENT).unwrap_or_default().to_owned();
    let client_ip = header_str(&req, &FORWARDED_FOR_HEADER)
        .map(str::to_owned)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "-".to_owned());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let response_bytes = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .or_else(|| response.body().size_hint().exact())
        .unwrap_or(0);

    info!(
        method = %method,
        status = response.status().as_u16(),
        uri = %uri,
        client_ip = %client_ip,
        request_id = %request_id,
        response_time_ms = start.elapsed().as_millis() as u64,
        response_bytes,
        user_agent = %user_agent,
        "Request completed"
    );

    response
}

fn header_str<'a>(req: &'a Request, name: &HeaderName) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// Reflects any origin back with credentials allowed.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ORIGIN,
            REQUESTED_WITH_HEADER,
            CONTENT_TYPE,
            ACCEPT,
            API_KEY_HEADER,
        ])
}

// ---------------------------------------------------------------------------
// Static dashboard
// ---------------------------------------------------------------------------

/// Serves files from the dashboard bundle, and `index.html` for any path
/// that is not a file so client-side routes resolve.
pub fn dashboard_service(static_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")))
}

// ---------------------------------------------------------------------------
// Panics
// ---------------------------------------------------------------------------

/// Builds the response used by `CatchPanicLayer`. The panic message is only
/// included when `expose_details` is set.
pub fn panic_response(
    expose_details: bool,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |panic: Box<dyn Any + Send + 'static>| {
        let detail = if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_owned()
        } else {
            "unknown panic".to_owned()
        };
        error!(panic = %detail, "Handler panicked");

        let message = if expose_details {
            detail
        } else {
            "Something went wrong".to_owned()
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal Server Error", "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn panic_body(expose_details: bool, payload: Box<dyn Any + Send>) -> (StatusCode, Value) {
        let resp = panic_response(expose_details)(payload);
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn panic_message_hidden_outside_development() {
        let (status, body) = panic_body(false, Box::new("db handle poisoned")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["message"], "Something went wrong");
    }

    #[tokio::test]
    async fn panic_message_exposed_in_development() {
        let (_, body) = panic_body(true, Box::new(String::from("index out of bounds"))).await;
        assert_eq!(body["message"], "index out of bounds");
    }
}
