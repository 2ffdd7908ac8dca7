//! Caller-facing response envelope.
//!
//! Every endpoint returns the same shape:
//!
//! ```json
//! { "success": true,  "data": { ... } }
//! { "success": false, "error": "...", "errorKind": "quota_exceeded" }
//! ```
//!
//! The HTTP status is derived from the error kind: input and quota problems
//! are 4xx, upstream failures are 5xx. Internal details are never leaked;
//! they are logged and replaced with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{ErrorKind, ScanError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// HTTP status for the response. Not serialized on the wire.
    #[serde(skip)]
    status: StatusCode,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::SegmentationEmpty => StatusCode::BAD_REQUEST,
        ErrorKind::ExtractionFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamRateLimited => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            status: StatusCode::OK,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: Some(kind),
            status: status_for(kind),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> From<ScanError> for ApiResponse<T> {
    fn from(err: ScanError) -> Self {
        let kind = err.kind();
        match kind {
            ErrorKind::Internal => {
                tracing::error!(error = %err, "Internal error mapped to response");
                ApiResponse::failure(kind, "Failed to process menu image")
            }
            _ => ApiResponse::failure(kind, err.to_string()),
        }
    }
}
