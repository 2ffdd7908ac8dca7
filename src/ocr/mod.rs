//! Text extraction over remote OCR engines.
//!
//! The [`TextExtractor`] trait is the seam the scan pipeline works against;
//! [`OcrProvider`] implements it for the configured engines:
//!
//! - `google/vision` — Google Cloud Vision text detection (tokens with
//!   bounding boxes, detected locale)
//! - `ocrspace/engine2` — OCR.space parse API (text overlay words)
//!
//! Engine selection and the primary→fallback chain live in the
//! orchestrator; each provider exposes exactly one engine. A provider with
//! missing credentials degrades to an unavailable backend that fails every
//! call with `EngineUnavailable` instead of refusing to boot.

mod api;
mod provider;
mod validate;

pub use provider::{OcrProvider, TextExtractor};
pub use validate::{decode_image_payload, validate_image};

use crate::models::RawTextBlock;

/// The uniform result of one OCR engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrExtraction {
    /// Full recognized text, newline-separated.
    pub text: String,
    /// Per-token blocks; empty when the engine returned no geometry.
    pub blocks: Vec<RawTextBlock>,
    /// Engine-reported or estimated confidence in [0,100].
    pub confidence: f32,
    /// BCP-47 language detected by the engine, when available.
    pub source_language: Option<String>,
}
