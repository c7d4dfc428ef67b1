use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::dto::ErrorDto;
use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The payload failed the shape check; nothing was written.
    #[error("{0}")]
    Validation(&'static str),

    #[error("Unauthorized: Invalid API Key")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Database error")]
    Storage(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let details = match &self {
            Self::Storage(e) => {
                error!(error = %e, "Storage operation failed");
                Some(e.to_string())
            }
            _ => None,
        };
        let body = ErrorDto {
            error: self.to_string(),
            details,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_is_bad_request_without_details() {
        let (status, body) = body_json(ApiError::Validation("Invalid sensor data")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid sensor data");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn unauthorized_and_not_found_statuses() {
        let (status, body) = body_json(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized: Invalid API Key");

        let (status, body) = body_json(ApiError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn storage_error_carries_details() {
        let err = ApiError::from(StoreError::Database(sqlx::Error::PoolClosed));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error");
        assert!(body["details"].as_str().unwrap().contains("closed"));
    }
}
