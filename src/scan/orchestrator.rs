use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{Config, OcrConfig};
use crate::enrichment::DescriptionEnricher;
use crate::error::{Result, ScanError};
use crate::layout::LayoutClusterer;
use crate::models::{MenuSection, OwnerKind, ScanResult};
use crate::ocr::{decode_image_payload, validate_image, OcrExtraction, TextExtractor};
use crate::quota::QuotaGate;
use crate::segmenter::{MenuSegmenter, SegmenterConfig};

/// One scan request as received from the caller.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Raw base64 or `data:` URL image payload.
    pub image: String,
    pub target_language: String,
    pub owner_id: String,
    pub owner_kind: OwnerKind,
}

/// The request lifecycle. Logged on every transition; `Failed` is reachable
/// from any stage through the error return path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Idle,
    QuotaChecked,
    ExtractingPrimary,
    ExtractingFallback,
    Segmenting,
    Enriching,
    Done,
}

impl std::fmt::Display for ScanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::QuotaChecked => write!(f, "quota_checked"),
            Self::ExtractingPrimary => write!(f, "extracting_primary"),
            Self::ExtractingFallback => write!(f, "extracting_fallback"),
            Self::Segmenting => write!(f, "segmenting"),
            Self::Enriching => write!(f, "enriching"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Runs one scan request end to end: quota gate, extraction with a single
/// sequential engine fallback, layout clustering, segmentation, enrichment,
/// then usage recording. The whole pipeline runs under an overall
/// wall-clock budget; each OCR attempt and generation call carries its own
/// shorter sub-budget.
pub struct ScanOrchestrator {
    quota: QuotaGate,
    primary: Arc<dyn TextExtractor>,
    fallback: Option<Arc<dyn TextExtractor>>,
    clusterer: LayoutClusterer,
    segmenter: MenuSegmenter,
    enricher: DescriptionEnricher,
    ocr_config: OcrConfig,
    language_hints: Vec<String>,
    overall_budget: Duration,
}

impl ScanOrchestrator {
    pub fn new(
        quota: QuotaGate,
        primary: Arc<dyn TextExtractor>,
        fallback: Option<Arc<dyn TextExtractor>>,
        enricher: DescriptionEnricher,
        config: &Config,
    ) -> Self {
        let language_hints = config
            .ocr
            .languages
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let segmenter = MenuSegmenter::new(
            SegmenterConfig::default()
                .with_extra_section_keywords(&config.scan.extra_section_keywords),
        );

        Self {
            quota,
            primary,
            fallback,
            clusterer: LayoutClusterer::default(),
            segmenter,
            enricher,
            ocr_config: config.ocr.clone(),
            language_hints,
            overall_budget: Duration::from_secs(config.scan.overall_budget_secs),
        }
    }

    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResult> {
        let started = Instant::now();

        if request.owner_id.trim().is_empty() {
            return Err(ScanError::InvalidInput("Missing owner id".to_string()));
        }
        if request.target_language.trim().is_empty() {
            return Err(ScanError::InvalidInput("Missing target language".to_string()));
        }

        let image = decode_image_payload(&request.image)?;
        validate_image(&image, &self.ocr_config)?;

        let decision = self
            .quota
            .authorize(&request.owner_id, request.owner_kind)
            .await?;
        info!(
            stage = %ScanStage::QuotaChecked,
            owner_id = %request.owner_id,
            allowed = decision.allowed,
            remaining = ?decision.remaining,
            "Quota checked"
        );
        if !decision.allowed {
            return Err(ScanError::QuotaExceeded {
                owner_id: request.owner_id.clone(),
            });
        }

        let budget_secs = self.overall_budget.as_secs();
        let mut result =
            match tokio::time::timeout(self.overall_budget, self.run_pipeline(&image, request))
                .await
            {
                Ok(inner) => inner?,
                Err(_) => return Err(ScanError::Timeout { budget_secs }),
            };

        // Usage is counted only once the scan has fully succeeded. A failed
        // or raced write never takes the result away from the caller.
        match self
            .quota
            .record_usage(&request.owner_id, request.owner_kind)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(owner_id = %request.owner_id, "Usage counter already saturated")
            }
            Err(e) => {
                warn!(owner_id = %request.owner_id, error = %e, "Failed to record scan usage");
                result
                    .warnings
                    .push("persistence_failure: quota usage write failed".to_string());
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            stage = %ScanStage::Done,
            sections = result.sections.len(),
            dishes = result.total_dishes(),
            duration_ms = result.duration_ms,
            "Scan finished"
        );
        Ok(result)
    }

    async fn run_pipeline(&self, image: &[u8], request: &ScanRequest) -> Result<ScanResult> {
        let extraction = self.extract_with_fallback(image).await?;

        info!(
            stage = %ScanStage::Segmenting,
            text_chars = extraction.text.chars().count(),
            blocks = extraction.blocks.len(),
            "Extraction complete"
        );

        let lines = self.clusterer.cluster(&extraction.blocks, &extraction.text);
        let mut sections = self.segmenter.segment(&lines);
        if sections.is_empty() {
            return Err(ScanError::SegmentationEmpty(
                "Could not identify menu items in the image".to_string(),
            ));
        }

        info!(
            stage = %ScanStage::Enriching,
            sections = sections.len(),
            "Segmentation complete"
        );

        let warnings = self
            .enrich_sections(&mut sections, &request.target_language)
            .await;

        let total_chars = extraction.text.chars().count();
        let confidence = MenuSegmenter::confidence(total_chars, &sections);

        let source_language = extraction
            .source_language
            .clone()
            .or_else(|| self.language_hints.first().cloned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ScanResult {
            sections,
            source_language,
            target_language: request.target_language.clone(),
            confidence,
            warnings,
            duration_ms: 0,
        })
    }

    /// Primary first; on any attempt failure (engine down, timeout, no or
    /// insufficient text, low confidence) the single fallback engine gets
    /// one sequential try. The engines are never raced.
    async fn extract_with_fallback(&self, image: &[u8]) -> Result<OcrExtraction> {
        info!(stage = %ScanStage::ExtractingPrimary, engine = %self.primary.name(), "Extracting");
        let primary_error = match self.attempt(self.primary.as_ref(), image).await {
            Ok(extraction) => return Ok(extraction),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error);
        };

        warn!(
            stage = %ScanStage::ExtractingFallback,
            engine = %fallback.name(),
            error = %primary_error,
            "Primary extraction failed, trying fallback"
        );

        self.attempt(fallback.as_ref(), image).await
    }

    async fn attempt(&self, engine: &dyn TextExtractor, image: &[u8]) -> Result<OcrExtraction> {
        let extraction = engine.extract(image, &self.language_hints).await?;

        let chars = extraction.text.chars().count();
        if chars < self.ocr_config.min_text_chars {
            return Err(ScanError::Extraction(format!(
                "{} returned insufficient text ({chars} chars)",
                engine.name()
            )));
        }

        if extraction.confidence < self.ocr_config.min_confidence {
            return Err(ScanError::Extraction(format!(
                "{} confidence too low ({:.0})",
                engine.name(),
                extraction.confidence
            )));
        }

        Ok(extraction)
    }

    async fn enrich_sections(
        &self,
        sections: &mut [MenuSection],
        target_language: &str,
    ) -> Vec<String> {
        let mut dishes: Vec<crate::models::Dish> = sections
            .iter()
            .flat_map(|s| s.dishes.iter().cloned())
            .collect();
        let total = dishes.len();

        let report = self.enricher.enrich(&mut dishes, target_language).await;

        let mut enriched = dishes.into_iter();
        for section in sections.iter_mut() {
            for dish in section.dishes.iter_mut() {
                if let Some(updated) = enriched.next() {
                    *dish = updated;
                }
            }
        }

        let mut warnings = Vec::new();
        if report.missing > 0 {
            let mut message =
                format!("enrichment_degraded: {} of {total} dishes missing explanations", report.missing);
            if report.rate_limited {
                message.push_str(" (generation was rate limited)");
            }
            warnings.push(message);
        }
        if report.persistence_failures > 0 {
            warnings.push(format!(
                "persistence_failure: {} explanation writes failed",
                report.persistence_failures
            ));
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, DatabaseBackend, ExplanationStore, LibSqlBackend, QuotaStore};
    use crate::llm::GenerationProvider;
    use crate::models::{CachedExplanation, RawTextBlock};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use image::{DynamicImage, ImageFormat};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted engine: returns canned outcomes in order and counts calls.
    struct StubExtractor {
        name: String,
        outcomes: std::sync::Mutex<Vec<Result<OcrExtraction>>>,
        calls: AtomicUsize,
    }

    impl StubExtractor {
        fn new(name: &str, outcomes: Vec<Result<OcrExtraction>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                outcomes: std::sync::Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextExtractor for StubExtractor {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn extract(&self, _image: &[u8], _hints: &[String]) -> Result<OcrExtraction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(ScanError::EngineUnavailable("no more outcomes".to_string()));
            }
            outcomes.remove(0)
        }
    }

    fn menu_extraction() -> OcrExtraction {
        let text = "APPETIZERS\nBruschetta\nToasted bread with tomato\n$8\nMAIN COURSES\nGrilled Salmon\n$19";
        OcrExtraction {
            text: text.to_string(),
            blocks: Vec::<RawTextBlock>::new(),
            confidence: 85.0,
            source_language: Some("en".to_string()),
        }
    }

    fn image_payload() -> String {
        let img = DynamicImage::new_rgb8(100, 100);
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
            .expect("encode png");
        STANDARD.encode(out)
    }

    fn request(owner: &str) -> ScanRequest {
        ScanRequest {
            image: image_payload(),
            target_language: "en".to_string(),
            owner_id: owner.to_string(),
            owner_kind: OwnerKind::Session,
        }
    }

    async fn build_orchestrator(
        primary: Arc<StubExtractor>,
        fallback: Option<Arc<StubExtractor>>,
    ) -> (tempfile::TempDir, ScanOrchestrator, Arc<dyn DatabaseBackend>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_config = DatabaseConfig {
            url: format!("file:{}", dir.path().join("scan.db").display()),
            auth_token: None,
            local_path: None,
        };
        let db = Database::new(&db_config).await.expect("database");
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));

        let config = Config::default();
        let quota = QuotaGate::new(backend.clone(), &config.quota);
        let enricher = DescriptionEnricher::new(
            backend.clone(),
            GenerationProvider::unavailable("test"),
            64,
            4,
        );

        let orchestrator = ScanOrchestrator::new(
            quota,
            primary as Arc<dyn TextExtractor>,
            fallback.map(|f| f as Arc<dyn TextExtractor>),
            enricher,
            &config,
        );
        (dir, orchestrator, backend)
    }

    #[tokio::test]
    async fn happy_path_builds_the_expected_sections() {
        let primary = StubExtractor::new("primary", vec![Ok(menu_extraction())]);
        let (_dir, orchestrator, store) = build_orchestrator(primary.clone(), None).await;

        store
            .save_explanation(&CachedExplanation::new("Bruschetta", "en", "Toasted bread."))
            .await
            .expect("save");

        let result = orchestrator.scan(&request("sess-1")).await.expect("scan");

        assert_eq!(result.sections.len(), 2);
        assert_eq!(result.sections[0].name, "APPETIZERS");
        assert_eq!(result.sections[0].dishes[0].price.as_deref(), Some("$8"));
        assert_eq!(
            result.sections[0].dishes[0].explanation.as_deref(),
            Some("Toasted bread.")
        );
        assert_eq!(result.sections[1].dishes[0].name, "Grilled Salmon");
        assert_eq!(result.source_language, "en");
        assert!(result.confidence > 0);

        // Enrichment could not cover Grilled Salmon; that is a warning, not
        // a failure.
        assert!(result.warnings.iter().any(|w| w.starts_with("enrichment_degraded")));

        let usage = store.get_usage("sess-1").await.expect("get").expect("row");
        assert_eq!(usage.used, 1);
    }

    #[tokio::test]
    async fn engine_failure_invokes_fallback_before_failing() {
        let primary = StubExtractor::new(
            "primary",
            vec![Err(ScanError::EngineUnavailable("down".to_string()))],
        );
        let fallback = StubExtractor::new("fallback", vec![Ok(menu_extraction())]);
        let (_dir, orchestrator, _store) =
            build_orchestrator(primary.clone(), Some(fallback.clone())).await;

        let result = orchestrator.scan(&request("sess-2")).await.expect("scan");
        assert_eq!(result.sections.len(), 2);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn both_engines_failing_is_extraction_failure() {
        let primary = StubExtractor::new(
            "primary",
            vec![Err(ScanError::EngineUnavailable("down".to_string()))],
        );
        let fallback = StubExtractor::new("fallback", vec![Err(ScanError::NoTextDetected)]);
        let (_dir, orchestrator, store) =
            build_orchestrator(primary, Some(fallback)).await;

        let err = orchestrator.scan(&request("sess-3")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExtractionFailure);

        // Failed scans never consume quota.
        let usage = store.get_usage("sess-3").await.expect("get").expect("row");
        assert_eq!(usage.used, 0);
    }

    #[tokio::test]
    async fn short_text_is_extraction_failure_and_never_segments() {
        let short = OcrExtraction {
            text: "menu".to_string(),
            blocks: Vec::new(),
            confidence: 85.0,
            source_language: None,
        };
        let primary = StubExtractor::new("primary", vec![Ok(short)]);
        let (_dir, orchestrator, _store) = build_orchestrator(primary, None).await;

        let err = orchestrator.scan(&request("sess-4")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExtractionFailure);
    }

    #[tokio::test]
    async fn low_confidence_primary_falls_back() {
        let mut weak = menu_extraction();
        weak.confidence = 10.0;
        let primary = StubExtractor::new("primary", vec![Ok(weak)]);
        let fallback = StubExtractor::new("fallback", vec![Ok(menu_extraction())]);
        let (_dir, orchestrator, _store) =
            build_orchestrator(primary.clone(), Some(fallback.clone())).await;

        orchestrator.scan(&request("sess-5")).await.expect("scan");
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn text_without_structure_is_segmentation_empty() {
        let unstructured = OcrExtraction {
            text: "$8\n$12\n$15\n$19\n$22".to_string(),
            blocks: Vec::new(),
            confidence: 85.0,
            source_language: None,
        };
        let primary = StubExtractor::new("primary", vec![Ok(unstructured)]);
        let (_dir, orchestrator, _store) = build_orchestrator(primary, None).await;

        let err = orchestrator.scan(&request("sess-6")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SegmentationEmpty);
    }

    #[tokio::test]
    async fn exhausted_quota_rejects_before_extraction() {
        let primary = StubExtractor::new("primary", vec![Ok(menu_extraction())]);
        let (_dir, orchestrator, store) = build_orchestrator(primary.clone(), None).await;

        store
            .ensure_owner("sess-7", OwnerKind::Session)
            .await
            .expect("ensure");
        for _ in 0..5 {
            store
                .try_increment("sess-7", Some(5))
                .await
                .expect("increment");
        }

        let err = orchestrator.scan(&request("sess-7")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::QuotaExceeded);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_quota_or_engines() {
        let primary = StubExtractor::new("primary", vec![Ok(menu_extraction())]);
        let (_dir, orchestrator, _store) = build_orchestrator(primary.clone(), None).await;

        let mut bad = request("sess-8");
        bad.image = STANDARD.encode(b"definitely not an image");
        let err = orchestrator.scan(&bad).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn scan_results_are_deterministic_for_identical_input() {
        let primary = StubExtractor::new(
            "primary",
            vec![Ok(menu_extraction()), Ok(menu_extraction())],
        );
        let (_dir, orchestrator, _store) = build_orchestrator(primary, None).await;

        let first = orchestrator.scan(&request("sess-9")).await.expect("scan");
        let second = orchestrator.scan(&request("sess-9")).await.expect("scan");
        assert_eq!(
            serde_json::to_string(&first.sections).expect("serialize"),
            serde_json::to_string(&second.sections).expect("serialize")
        );
    }
}
