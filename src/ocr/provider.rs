use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{parse_provider_model, OcrConfig, OcrEngineConfig, KNOWN_OCR_PROVIDERS};
use crate::error::{Result, ScanError};

use super::api::{GoogleVisionClient, OcrSpaceClient};
use super::OcrExtraction;

/// One OCR engine behind a uniform extraction call. The orchestrator owns
/// engine selection and fallback ordering.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Engine identifier used in logs and warnings.
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn extract(&self, image_bytes: &[u8], language_hints: &[String])
        -> Result<OcrExtraction>;
}

#[derive(Clone)]
enum OcrBackend {
    GoogleVision(GoogleVisionClient),
    OcrSpace(OcrSpaceClient),
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    engine: String,
    attempt_timeout_secs: u64,
}

impl OcrProvider {
    pub fn new(engine_config: &OcrEngineConfig, ocr_config: &OcrConfig) -> Self {
        let engine_lower = engine_config.engine.to_lowercase();
        let (provider, _model) = parse_provider_model(&engine_lower, KNOWN_OCR_PROVIDERS);

        let backend = match provider {
            "google" => match GoogleVisionClient::new(engine_config, ocr_config) {
                Ok(client) => {
                    info!(engine = %engine_config.engine, "Google Vision OCR backend initialized");
                    OcrBackend::GoogleVision(client)
                }
                Err(e) => {
                    let reason = format!("Google Vision backend unavailable: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            "ocrspace" => match OcrSpaceClient::new(engine_config, ocr_config) {
                Ok(client) => {
                    info!(engine = %engine_config.engine, "OCR.space backend initialized");
                    OcrBackend::OcrSpace(client)
                }
                Err(e) => {
                    let reason = format!("OCR.space backend unavailable: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            _ => {
                let reason = format!("Unknown OCR engine: {}", engine_config.engine);
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Self {
            backend,
            engine: engine_config.engine.clone(),
            attempt_timeout_secs: ocr_config.attempt_timeout_secs,
        }
    }

    async fn extract_inner(
        &self,
        image_bytes: &[u8],
        language_hints: &[String],
    ) -> Result<OcrExtraction> {
        match &self.backend {
            OcrBackend::GoogleVision(client) => client.extract(image_bytes, language_hints).await,
            OcrBackend::OcrSpace(client) => client.extract(image_bytes, language_hints).await,
            OcrBackend::Unavailable { reason } => {
                Err(ScanError::EngineUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl TextExtractor for OcrProvider {
    fn name(&self) -> &str {
        &self.engine
    }

    fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    async fn extract(
        &self,
        image_bytes: &[u8],
        language_hints: &[String],
    ) -> Result<OcrExtraction> {
        let budget = Duration::from_secs(self.attempt_timeout_secs);
        match tokio::time::timeout(budget, self.extract_inner(image_bytes, language_hints)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Extraction(format!(
                "{} attempt timed out after {} seconds",
                self.engine, self.attempt_timeout_secs
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ocr_config(primary_key: Option<&str>) -> OcrConfig {
        OcrConfig {
            primary: OcrEngineConfig {
                engine: "google/vision".to_string(),
                api_key: primary_key.map(String::from),
                base_url: None,
            },
            fallback: None,
            languages: "en".to_string(),
            attempt_timeout_secs: 15,
            max_retries: 0,
            min_text_chars: 10,
            min_confidence: 40.0,
            max_image_dimension: 4096,
            min_image_dimension: 50,
        }
    }

    #[test]
    fn provider_without_key_degrades_to_unavailable() {
        let config = ocr_config(None);
        let provider = OcrProvider::new(&config.primary, &config);
        assert!(!provider.is_available());
    }

    #[test]
    fn provider_with_key_is_available() {
        let config = ocr_config(Some("test-key"));
        let provider = OcrProvider::new(&config.primary, &config);
        assert!(provider.is_available());
        assert_eq!(provider.name(), "google/vision");
    }

    #[test]
    fn unknown_engine_degrades_to_unavailable() {
        let config = ocr_config(Some("test-key"));
        let engine = OcrEngineConfig {
            engine: "acme/reader".to_string(),
            api_key: Some("k".to_string()),
            base_url: None,
        };
        let provider = OcrProvider::new(&engine, &config);
        assert!(!provider.is_available());
    }

    #[tokio::test]
    async fn unavailable_provider_fails_with_engine_unavailable() {
        let config = ocr_config(None);
        let provider = OcrProvider::new(&config.primary, &config);
        let result = provider.extract(&[], &["en".to_string()]).await;
        assert!(matches!(result, Err(ScanError::EngineUnavailable(_))));
    }

    #[test]
    fn ocrspace_engine_routes_to_ocrspace_backend() {
        let config = ocr_config(Some("test-key"));
        let engine = OcrEngineConfig {
            engine: "ocrspace/engine2".to_string(),
            api_key: Some("k".to_string()),
            base_url: None,
        };
        let provider = OcrProvider::new(&engine, &config);
        assert!(provider.is_available());
        assert_eq!(provider.name(), "ocrspace/engine2");
    }
}
