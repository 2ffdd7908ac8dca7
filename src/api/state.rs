use std::sync::Arc;

use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::enrichment::DescriptionEnricher;
use crate::llm::GenerationProvider;
use crate::ocr::{OcrProvider, TextExtractor};
use crate::quota::QuotaGate;
use crate::scan::ScanOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub quota: QuotaGate,
    pub enricher: DescriptionEnricher,
    pub orchestrator: Arc<ScanOrchestrator>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn DatabaseBackend>,
        primary: OcrProvider,
        fallback: Option<OcrProvider>,
        generation: GenerationProvider,
    ) -> Self {
        let config = Arc::new(config);
        let quota = QuotaGate::new(db.clone(), &config.quota);

        let (cache_size, max_concurrency) = config
            .generation
            .as_ref()
            .map(|g| (g.cache_size, g.max_concurrency))
            .unwrap_or((1024, 4));
        let enricher =
            DescriptionEnricher::new(db.clone(), generation, cache_size, max_concurrency);

        let orchestrator = Arc::new(ScanOrchestrator::new(
            quota.clone(),
            Arc::new(primary) as Arc<dyn TextExtractor>,
            fallback.map(|f| Arc::new(f) as Arc<dyn TextExtractor>),
            enricher.clone(),
            &config,
        ));

        Self {
            config,
            db,
            quota,
            enricher,
            orchestrator,
        }
    }
}
