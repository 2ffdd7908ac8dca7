use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageReader;

use crate::config::OcrConfig;
use crate::error::{Result, ScanError};

/// Decode a caller-supplied image payload: raw base64 or a full
/// `data:image/...;base64,` URL.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidInput("No image provided".to_string()));
    }

    let encoded = if trimmed.starts_with("data:") {
        trimmed
            .split_once(',')
            .map(|(_, rest)| rest)
            .ok_or_else(|| ScanError::InvalidInput("Malformed data URL".to_string()))?
    } else {
        trimmed
    };

    STANDARD
        .decode(encoded)
        .map_err(|e| ScanError::InvalidInput(format!("Image is not valid base64: {e}")))
}

/// Reject payloads that are not readable images before any engine is
/// called: content sniff, then header-only dimension bounds.
pub fn validate_image(bytes: &[u8], config: &OcrConfig) -> Result<()> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {}
        Some(kind) => {
            return Err(ScanError::InvalidInput(format!(
                "Expected an image, got {}",
                kind.mime_type()
            )));
        }
        None => {
            return Err(ScanError::InvalidInput(
                "Unrecognized image payload".to_string(),
            ));
        }
    }

    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::InvalidInput(format!("Failed to read image: {e}")))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ScanError::InvalidInput(format!("Failed to decode image: {e}")))?;

    if width < config.min_image_dimension || height < config.min_image_dimension {
        return Err(ScanError::InvalidInput(format!(
            "Image too small: {}x{}, minimum {}x{}",
            width, height, config.min_image_dimension, config.min_image_dimension
        )));
    }

    if width > config.max_image_dimension || height > config.max_image_dimension {
        return Err(ScanError::InvalidInput(format!(
            "Image too large: {}x{}, maximum {}x{}",
            width, height, config.max_image_dimension, config.max_image_dimension
        )));
    }

    Ok(())
}
