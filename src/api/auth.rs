//! Shared-secret check for the write endpoints.
//!
//! The device sends the key in an `X-API-Key` header or, when it cannot set
//! headers, as an `api_key` query parameter.

use axum::{
    extract::{Query, Request, State},
    http::HeaderName,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::warn;

use super::{errors::ApiError, AppState};

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

#[derive(Debug, Deserialize)]
struct ApiKeyParams {
    api_key: Option<String>,
}

/// Header first, then query string. Empty values count as missing.
fn extract_api_key(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    from_header.or_else(|| {
        Query::<ApiKeyParams>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(params)| params.api_key)
            .filter(|s| !s.is_empty())
    })
}

/// Rejects the request with 401 unless it carries the configured key.
/// Runs before the body is read, so invalid payloads with a bad key still
/// get 401.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match extract_api_key(&req) {
        Some(key) if key == *state.api_key => Ok(next.run(req).await),
        supplied => {
            warn!(
                path = %req.uri().path(),
                key_present = supplied.is_some(),
                "Rejected write with invalid API key"
            );
            Err(ApiError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::HeaderValue};

    use super::*;

    fn request(uri: &str, header: Option<&'static str>) -> Request {
        let mut req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        if let Some(v) = header {
            req.headers_mut()
                .insert(API_KEY_HEADER, HeaderValue::from_static(v));
        }
        req
    }

    #[test]
    fn extract_api_key_from_header() {
        let req = request("/api/sensor", Some("secret"));
        assert_eq!(extract_api_key(&req), Some("secret".to_string()));
    }

    #[test]
    fn extract_api_key_from_query() {
        let req = request("/api/sensor?api_key=secret&x=1", None);
        assert_eq!(extract_api_key(&req), Some("secret".to_string()));
    }

    #[test]
    fn header_takes_precedence_over_query() {
        let req = request("/api/sensor?api_key=from-query", Some("from-header"));
        assert_eq!(extract_api_key(&req), Some("from-header".to_string()));
    }

    #[test]
    fn empty_header_falls_back_to_query() {
        let req = request("/api/sensor?api_key=from-query", Some(""));
        assert_eq!(extract_api_key(&req), Some("from-query".to_string()));
    }

    #[test]
    fn extract_api_key_returns_none_without_key() {
        assert_eq!(extract_api_key(&request("/api/sensor", None)), None);
        assert_eq!(extract_api_key(&request("/api/sensor?api_key=", None)), None);
    }
}
