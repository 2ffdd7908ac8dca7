use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;

use crate::config::{OcrConfig, OcrEngineConfig};
use crate::error::{Result, ScanError};
use crate::models::{BoundingBox, RawTextBlock};

use super::OcrExtraction;

/// Neither engine reports a usable confidence for plain text detection;
/// a fixed estimate stands in.
const ESTIMATED_CONFIDENCE: f32 = 85.0;

#[derive(Clone, Debug)]
pub struct GoogleVisionClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct OcrSpaceClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

// -- Google Vision wire types ------------------------------------------------

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResult {
    #[serde(rename = "textAnnotations", default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
    locale: Option<String>,
    #[serde(rename = "boundingPoly")]
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Debug, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

impl TextAnnotation {
    fn to_block(&self) -> RawTextBlock {
        let bounds = self.bounding_poly.as_ref().and_then(poly_to_box);
        RawTextBlock {
            text: self.description.clone(),
            bounds,
        }
    }
}

fn poly_to_box(poly: &BoundingPoly) -> Option<BoundingBox> {
    if poly.vertices.is_empty() {
        return None;
    }
    let min_x = poly.vertices.iter().map(|v| v.x).fold(f32::INFINITY, f32::min);
    let min_y = poly.vertices.iter().map(|v| v.y).fold(f32::INFINITY, f32::min);
    let max_x = poly.vertices.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max);
    let max_y = poly.vertices.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max);
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

impl GoogleVisionClient {
    pub fn new(engine: &OcrEngineConfig, ocr: &OcrConfig) -> Result<Self> {
        let api_key = engine.api_key.clone().ok_or_else(|| {
            ScanError::EngineUnavailable("API key required for Google Vision".to_string())
        })?;

        let base_url = engine
            .base_url
            .clone()
            .unwrap_or_else(|| "https://vision.googleapis.com".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(ocr.attempt_timeout_secs))
            .build()
            .map_err(|e| {
                ScanError::EngineUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            max_retries: ocr.max_retries,
        })
    }

    pub async fn extract(
        &self,
        image_bytes: &[u8],
        language_hints: &[String],
    ) -> Result<OcrExtraction> {
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image_bytes) },
                "features": [{ "type": "TEXT_DETECTION" }],
                "imageContext": { "languageHints": language_hints },
            }]
        });

        let url = format!("{}/v1/images:annotate?key={}", self.base_url, self.api_key);

        let mut attempt = 0;
        let response: AnnotateResponse = loop {
            let sent = self.client.post(&url).json(&body).send().await;
            match sent {
                Ok(resp) if resp.status().is_success() => {
                    break resp.json().await.map_err(|e| {
                        ScanError::Extraction(format!("Failed to parse Vision response: {e}"))
                    })?;
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    if attempt >= self.max_retries {
                        return Err(ScanError::RateLimited { retry_after: None });
                    }
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= self.max_retries {
                        return Err(ScanError::Extraction(format!(
                            "Vision request failed after {} retries: {}",
                            self.max_retries,
                            resp.status()
                        )));
                    }
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ScanError::Extraction(format!(
                        "Vision request failed: {status} - {body}"
                    )));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScanError::EngineUnavailable(format!(
                            "Vision unreachable after {} retries: {e}",
                            self.max_retries
                        )));
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(100 * 2_u64.pow(attempt))).await;
        };

        let result = response
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::Extraction("Empty Vision response".to_string()))?;

        if let Some(status) = result.error {
            return Err(ScanError::Extraction(format!(
                "Vision returned an error: {}",
                status.message
            )));
        }

        // The first annotation is the whole document; the rest are tokens.
        let mut annotations = result.text_annotations.into_iter();
        let full = annotations.next().ok_or(ScanError::NoTextDetected)?;

        Ok(OcrExtraction {
            text: full.description.trim().to_string(),
            blocks: annotations.map(|a| a.to_block()).collect(),
            confidence: ESTIMATED_CONFIDENCE,
            source_language: full.locale,
        })
    }
}

// -- OCR.space wire types ----------------------------------------------------

#[derive(Debug, Deserialize)]
struct OcrSpaceResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    is_errored: bool,
    /// String or array of strings depending on the failure.
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: String,
    #[serde(rename = "TextOverlay")]
    text_overlay: Option<TextOverlay>,
}

#[derive(Debug, Deserialize)]
struct TextOverlay {
    #[serde(rename = "Lines", default)]
    lines: Vec<OverlayLine>,
}

#[derive(Debug, Deserialize)]
struct OverlayLine {
    #[serde(rename = "Words", default)]
    words: Vec<OverlayWord>,
}

#[derive(Debug, Deserialize)]
struct OverlayWord {
    #[serde(rename = "WordText", default)]
    word_text: String,
    #[serde(rename = "Left", default)]
    left: f32,
    #[serde(rename = "Top", default)]
    top: f32,
    #[serde(rename = "Width", default)]
    width: f32,
    #[serde(rename = "Height", default)]
    height: f32,
}

/// OCR.space takes ISO 639-2 codes; menus mostly arrive with two-letter
/// hints.
fn ocrspace_language(hints: &[String]) -> &'static str {
    match hints.first().map(|h| h.to_lowercase()) {
        Some(code) => match code.as_str() {
            "en" | "eng" => "eng",
            "es" | "spa" => "spa",
            "fr" | "fre" => "fre",
            "de" | "ger" => "ger",
            "it" | "ita" => "ita",
            "pt" | "por" => "por",
            "ja" | "jpn" => "jpn",
            "ko" | "kor" => "kor",
            "zh" | "chs" => "chs",
            _ => "eng",
        },
        None => "eng",
    }
}

impl OcrSpaceClient {
    pub fn new(engine: &OcrEngineConfig, ocr: &OcrConfig) -> Result<Self> {
        let api_key = engine.api_key.clone().ok_or_else(|| {
            ScanError::EngineUnavailable("API key required for OCR.space".to_string())
        })?;

        let base_url = engine
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.ocr.space".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(ocr.attempt_timeout_secs))
            .build()
            .map_err(|e| {
                ScanError::EngineUnavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            max_retries: ocr.max_retries,
        })
    }

    fn form(&self, image_bytes: &[u8], language_hints: &[String]) -> reqwest::multipart::Form {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(image_bytes));
        reqwest::multipart::Form::new()
            .text("apikey", self.api_key.clone())
            .text("base64Image", data_url)
            .text("language", ocrspace_language(language_hints))
            .text("isOverlayRequired", "true")
            .text("detectOrientation", "true")
            .text("scale", "true")
            .text("OCREngine", "2")
    }

    pub async fn extract(
        &self,
        image_bytes: &[u8],
        language_hints: &[String],
    ) -> Result<OcrExtraction> {
        let url = format!("{}/parse/image", self.base_url);

        let mut attempt = 0;
        let response: OcrSpaceResponse = loop {
            let sent = self
                .client
                .post(&url)
                .multipart(self.form(image_bytes, language_hints))
                .send()
                .await;
            match sent {
                Ok(resp) if resp.status().is_success() => {
                    break resp.json().await.map_err(|e| {
                        ScanError::Extraction(format!("Failed to parse OCR.space response: {e}"))
                    })?;
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    if attempt >= self.max_retries {
                        return Err(ScanError::RateLimited { retry_after: None });
                    }
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= self.max_retries {
                        return Err(ScanError::Extraction(format!(
                            "OCR.space request failed after {} retries: {}",
                            self.max_retries,
                            resp.status()
                        )));
                    }
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ScanError::Extraction(format!(
                        "OCR.space request failed: {status} - {body}"
                    )));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScanError::EngineUnavailable(format!(
                            "OCR.space unreachable after {} retries: {e}",
                            self.max_retries
                        )));
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(100 * 2_u64.pow(attempt))).await;
        };

        if response.is_errored {
            let message = response
                .error_message
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown processing error".to_string());
            return Err(ScanError::Extraction(format!(
                "OCR.space processing error: {message}"
            )));
        }

        let result = response
            .parsed_results
            .into_iter()
            .next()
            .ok_or(ScanError::NoTextDetected)?;

        let text = result.parsed_text.trim().to_string();
        if text.is_empty() {
            return Err(ScanError::NoTextDetected);
        }

        let blocks = result
            .text_overlay
            .map(|overlay| {
                overlay
                    .lines
                    .into_iter()
                    .flat_map(|line| line.words)
                    .filter(|w| !w.word_text.trim().is_empty())
                    .map(|w| {
                        RawTextBlock::with_bounds(
                            w.word_text,
                            BoundingBox {
                                x: w.left,
                                y: w.top,
                                width: w.width,
                                height: w.height,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(OcrExtraction {
            text,
            blocks,
            confidence: ESTIMATED_CONFIDENCE,
            source_language: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_config(api_key: Option<&str>) -> OcrEngineConfig {
        OcrEngineConfig {
            engine: "google/vision".to_string(),
            api_key: api_key.map(String::from),
            base_url: None,
        }
    }

    fn ocr_config() -> OcrConfig {
        OcrConfig {
            primary: engine_config(Some("test-key")),
            fallback: None,
            languages: "en".to_string(),
            attempt_timeout_secs: 15,
            max_retries: 1,
            min_text_chars: 10,
            min_confidence: 40.0,
            max_image_dimension: 4096,
            min_image_dimension: 50,
        }
    }

    #[test]
    fn vision_client_requires_api_key() {
        let result = GoogleVisionClient::new(&engine_config(None), &ocr_config());
        assert!(matches!(result, Err(ScanError::EngineUnavailable(_))));
    }

    #[test]
    fn ocrspace_client_requires_api_key() {
        let result = OcrSpaceClient::new(&engine_config(None), &ocr_config());
        assert!(matches!(result, Err(ScanError::EngineUnavailable(_))));
    }

    #[test]
    fn custom_base_url_is_honored() {
        let mut engine = engine_config(Some("test-key"));
        engine.base_url = Some("http://localhost:9999".to_string());
        let client = GoogleVisionClient::new(&engine, &ocr_config()).expect("client");
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn poly_to_box_spans_all_vertices() {
        let poly = BoundingPoly {
            vertices: vec![
                Vertex { x: 10.0, y: 20.0 },
                Vertex { x: 90.0, y: 20.0 },
                Vertex { x: 90.0, y: 44.0 },
                Vertex { x: 10.0, y: 44.0 },
            ],
        };
        let bounds = poly_to_box(&poly).expect("box");
        assert_eq!(bounds.x, 10.0);
        assert_eq!(bounds.y, 20.0);
        assert_eq!(bounds.width, 80.0);
        assert_eq!(bounds.height, 24.0);
    }

    #[test]
    fn poly_to_box_handles_empty_vertices() {
        assert!(poly_to_box(&BoundingPoly { vertices: vec![] }).is_none());
    }

    #[test]
    fn ocrspace_language_mapping() {
        assert_eq!(ocrspace_language(&["en".to_string()]), "eng");
        assert_eq!(ocrspace_language(&["it".to_string()]), "ita");
        assert_eq!(ocrspace_language(&["xx".to_string()]), "eng");
        assert_eq!(ocrspace_language(&[]), "eng");
    }

    #[test]
    fn ocrspace_error_message_accepts_arrays() {
        let raw = r#"{
            "ParsedResults": [],
            "IsErroredOnProcessing": true,
            "ErrorMessage": ["E101", "Timed out waiting for results"]
        }"#;
        let parsed: OcrSpaceResponse = serde_json::from_str(raw).expect("parse");
        assert!(parsed.is_errored);
        assert!(parsed.error_message.is_some());
    }

    #[test]
    fn vision_response_parses_annotations() {
        let raw = r#"{
            "responses": [{
                "textAnnotations": [
                    { "description": "APPETIZERS\nBruschetta", "locale": "en" },
                    { "description": "APPETIZERS", "boundingPoly": { "vertices": [
                        {"x": 10, "y": 10}, {"x": 200, "y": 10},
                        {"x": 200, "y": 38}, {"x": 10, "y": 38}
                    ]}}
                ]
            }]
        }"#;
        let parsed: AnnotateResponse = serde_json::from_str(raw).expect("parse");
        let result = &parsed.responses[0];
        assert_eq!(result.text_annotations.len(), 2);
        assert_eq!(result.text_annotations[0].locale.as_deref(), Some("en"));
        let block = result.text_annotations[1].to_block();
        assert_eq!(block.bounds.expect("bounds").height, 28.0);
    }
}
