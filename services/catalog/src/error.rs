//! Error boundary for the HTTP API.
//!
//! Every handler returns [`ApiError`]; the [`IntoResponse`] impl is the one
//! place where failures become status codes and JSON bodies. The upload route
//! reports through a `message` key, the database routes through `error`.

use crate::blob_store::BlobStoreError;
use crate::catalog_store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No video or image to upload")]
    NoUploadFile,

    #[error("File is neither a video or image")]
    UnsupportedMedia,

    #[error("An error occurred: {0}")]
    Upload(String),

    #[error("Invalid input")]
    InvalidInput,

    #[error("Database not found")]
    DatabaseNotFound,

    #[error("Container not found")]
    ContainerNotFound,

    #[error("{0}")]
    Database(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoUploadFile => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UnsupportedMedia | ApiError::InvalidInput => StatusCode::BAD_REQUEST,
            ApiError::DatabaseNotFound | ApiError::ContainerNotFound => StatusCode::NOT_FOUND,
            ApiError::Upload(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON key carrying the description
    fn body_key(&self) -> &'static str {
        match self {
            ApiError::NoUploadFile | ApiError::UnsupportedMedia | ApiError::Upload(_) => "message",
            _ => "error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut body = Map::new();
        body.insert(self.body_key().to_string(), Value::String(self.to_string()));
        (status, Json(Value::Object(body))).into_response()
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(e: BlobStoreError) -> Self {
        ApiError::Upload(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseNotFound => ApiError::DatabaseNotFound,
            StoreError::ContainerNotFound => ApiError::ContainerNotFound,
            other => ApiError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NoUploadFile.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ApiError::UnsupportedMedia.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ContainerNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Database("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upload_error_message() {
        let err: ApiError = BlobStoreError::Upload("access denied".to_string()).into();
        assert_eq!(err.to_string(), "An error occurred: access denied");
        assert_eq!(err.body_key(), "message");
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            ApiError::from(StoreError::DatabaseNotFound),
            ApiError::DatabaseNotFound
        ));
        assert!(matches!(
            ApiError::from(StoreError::ContainerNotFound),
            ApiError::ContainerNotFound
        ));
        assert!(matches!(ApiError::from(StoreError::MissingId), ApiError::Database(_)));
        assert_eq!(ApiError::DatabaseNotFound.body_key(), "error");
    }
}
