use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Scan quota exceeded for owner {owner_id}")]
    QuotaExceeded { owner_id: String },

    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("No text detected in image")]
    NoTextDetected,

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("No menu structure found: {0}")]
    SegmentationEmpty(String),

    #[error("Scan timed out after {budget_secs} seconds")]
    Timeout { budget_secs: u64 },

    #[error("Upstream rate limit exceeded, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire-level classification of a failed scan. Set at the point of failure,
/// never inferred from message text downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    QuotaExceeded,
    ExtractionFailure,
    SegmentationEmpty,
    Timeout,
    UpstreamRateLimited,
    Unauthorized,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::QuotaExceeded => write!(f, "quota_exceeded"),
            Self::ExtractionFailure => write!(f, "extraction_failure"),
            Self::SegmentationEmpty => write!(f, "segmentation_empty"),
            Self::Timeout => write!(f, "timeout"),
            Self::UpstreamRateLimited => write!(f, "upstream_rate_limited"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::EngineUnavailable(_) | Self::NoTextDetected | Self::Extraction(_) => {
                ErrorKind::ExtractionFailure
            }
            Self::SegmentationEmpty(_) => ErrorKind::SegmentationEmpty,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::UpstreamRateLimited,
            Self::Auth(_) => ErrorKind::Unauthorized,
            Self::Generation(_)
            | Self::GenerationUnavailable(_)
            | Self::Database(_)
            | Self::Http(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
