//! Dish explanation enrichment: persisted-cache matching first, bounded
//! generation for the rest.
//!
//! Cache resolution order per dish: in-process LRU, exact store lookup,
//! then fuzzy matching (substring, token overlap) over the language's
//! stored entries. Unresolved dishes go to the generation collaborator
//! through a small worker pool; one observed rate-limit response flips the
//! pool into serialized-with-backoff mode for the remaining calls.
//! Enrichment never fails a scan — every failure downgrades to a count in
//! the report.

mod cache;
mod matcher;

pub use cache::ExplanationCache;
pub use matcher::{find_best_match, normalize_name};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::db::DatabaseBackend;
use crate::error::{Result, ScanError};
use crate::llm::GenerationProvider;
use crate::models::{CachedExplanation, Dish};

/// Pause applied before each serialized call once the upstream has
/// rate-limited us.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_millis(500);

/// Where a single explanation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationSource {
    Cache,
    Generated,
}

/// Non-fatal bookkeeping for one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub cache_hits: usize,
    pub generated: usize,
    pub missing: usize,
    pub persistence_failures: usize,
    pub rate_limited: bool,
}

#[derive(Clone)]
pub struct DescriptionEnricher {
    store: Arc<dyn DatabaseBackend>,
    generation: GenerationProvider,
    cache: ExplanationCache,
    max_concurrency: usize,
}

impl DescriptionEnricher {
    pub fn new(
        store: Arc<dyn DatabaseBackend>,
        generation: GenerationProvider,
        cache_size: usize,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            generation,
            cache: ExplanationCache::new(cache_size.max(1)),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Populate `explanation` on every dish the cache or generator can
    /// resolve. Mutates dishes in place; returns the pass report.
    pub async fn enrich(&self, dishes: &mut [Dish], language: &str) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();

        // Front cache first.
        for dish in dishes.iter_mut() {
            if let Some(explanation) = self.cache.get(&dish.name, language) {
                dish.explanation = Some(explanation);
                report.cache_hits += 1;
            }
        }

        // Exact batch lookup against the store.
        let unresolved_names: Vec<String> = dishes
            .iter()
            .filter(|d| d.explanation.is_none())
            .map(|d| d.name.clone())
            .collect();

        if !unresolved_names.is_empty() {
            match self.store.lookup_many(&unresolved_names, language).await {
                Ok(found) => {
                    for dish in dishes.iter_mut().filter(|d| d.explanation.is_none()) {
                        if let Some(explanation) = found.get(&dish.name.to_lowercase()) {
                            dish.explanation = Some(explanation.clone());
                            self.cache.put(&dish.name, language, explanation.clone());
                            report.cache_hits += 1;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Explanation batch lookup failed"),
            }
        }

        // Fuzzy matching over the language's stored entries.
        if dishes.iter().any(|d| d.explanation.is_none()) {
            match self.store.list_by_language(language).await {
                Ok(entries) if !entries.is_empty() => {
                    for dish in dishes.iter_mut().filter(|d| d.explanation.is_none()) {
                        if let Some(hit) = find_best_match(&dish.name, &entries) {
                            dish.explanation = Some(hit.explanation.clone());
                            self.cache.put(&dish.name, language, hit.explanation.clone());
                            report.cache_hits += 1;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Explanation listing failed"),
            }
        }

        self.generate_missing(dishes, language, &mut report).await;

        debug!(
            cache_hits = report.cache_hits,
            generated = report.generated,
            missing = report.missing,
            "Enrichment pass finished"
        );
        report
    }

    async fn generate_missing(
        &self,
        dishes: &mut [Dish],
        language: &str,
        report: &mut EnrichmentReport,
    ) {
        let pending: Vec<usize> = dishes
            .iter()
            .enumerate()
            .filter(|(_, d)| d.explanation.is_none())
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return;
        }

        if !self.generation.is_available() {
            report.missing += pending.len();
            return;
        }

        let pool = Arc::new(Semaphore::new(self.max_concurrency));
        let serial = Arc::new(Semaphore::new(1));
        let degraded = Arc::new(AtomicBool::new(false));

        let tasks = pending.iter().map(|&idx| {
            let dish = dishes[idx].clone();
            let language = language.to_string();
            let generation = self.generation.clone();
            let pool = pool.clone();
            let serial = serial.clone();
            let degraded = degraded.clone();

            async move {
                let result = Self::generate_one(
                    &generation,
                    &dish,
                    &language,
                    &pool,
                    &serial,
                    &degraded,
                )
                .await;
                (idx, result)
            }
        });

        let results = futures::future::join_all(tasks).await;

        for (idx, result) in results {
            match result {
                Ok(explanation) => {
                    let dish = &mut dishes[idx];
                    let record =
                        CachedExplanation::new(dish.name.clone(), language, explanation.clone());
                    if let Err(e) = self.store.save_explanation(&record).await {
                        warn!(dish = %dish.name, error = %e, "Failed to persist explanation");
                        report.persistence_failures += 1;
                    }
                    self.cache.put(&dish.name, language, explanation.clone());
                    dish.explanation = Some(explanation);
                    report.generated += 1;
                }
                Err(e) => {
                    if matches!(e, ScanError::RateLimited { .. }) {
                        report.rate_limited = true;
                    }
                    warn!(dish = %dishes[idx].name, error = %e, "Explanation generation failed");
                    report.missing += 1;
                }
            }
        }

        report.rate_limited |= degraded.load(Ordering::SeqCst);
    }

    async fn generate_one(
        generation: &GenerationProvider,
        dish: &Dish,
        language: &str,
        pool: &Semaphore,
        serial: &Semaphore,
        degraded: &AtomicBool,
    ) -> Result<String> {
        if degraded.load(Ordering::SeqCst) {
            let _permit = serial
                .acquire()
                .await
                .map_err(|_| ScanError::Internal("Generation pool closed".to_string()))?;
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            return generation
                .explain(
                    &dish.name,
                    dish.original_description.as_deref(),
                    &dish.dietary_tags,
                    language,
                )
                .await;
        }

        let permit = pool
            .acquire()
            .await
            .map_err(|_| ScanError::Internal("Generation pool closed".to_string()))?;
        let first = generation
            .explain(
                &dish.name,
                dish.original_description.as_deref(),
                &dish.dietary_tags,
                language,
            )
            .await;
        drop(permit);

        match first {
            Err(ScanError::RateLimited { .. }) => {
                // Flip the remaining calls to serialized mode and give this
                // dish one more serialized try.
                degraded.store(true, Ordering::SeqCst);
                let _permit = serial
                    .acquire()
                    .await
                    .map_err(|_| ScanError::Internal("Generation pool closed".to_string()))?;
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                generation
                    .explain(
                        &dish.name,
                        dish.original_description.as_deref(),
                        &dish.dietary_tags,
                        language,
                    )
                    .await
            }
            other => other,
        }
    }

    /// Resolve one dish on demand: cache first, then generation, persisting
    /// a fresh result.
    pub async fn explain_single(
        &self,
        name: &str,
        description: Option<&str>,
        dietary_tags: &std::collections::BTreeSet<String>,
        language: &str,
    ) -> Result<(String, ExplanationSource)> {
        if let Some(explanation) = self.cache.get(name, language) {
            return Ok((explanation, ExplanationSource::Cache));
        }

        let names = [name.to_string()];
        let found = self.store.lookup_many(&names, language).await?;
        if let Some(explanation) = found.get(&name.to_lowercase()) {
            self.cache.put(name, language, explanation.clone());
            return Ok((explanation.clone(), ExplanationSource::Cache));
        }

        let entries = self.store.list_by_language(language).await?;
        if let Some(hit) = find_best_match(name, &entries) {
            self.cache.put(name, language, hit.explanation.clone());
            return Ok((hit.explanation.clone(), ExplanationSource::Cache));
        }

        let explanation = self
            .generation
            .explain(name, description, dietary_tags, language)
            .await?;

        let record = CachedExplanation::new(name, language, explanation.clone());
        if let Err(e) = self.store.save_explanation(&record).await {
            warn!(dish = %name, error = %e, "Failed to persist explanation");
        }
        self.cache.put(name, language, explanation.clone());

        Ok((explanation, ExplanationSource::Generated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, ExplanationStore, LibSqlBackend};
    use tempfile::tempdir;

    async fn enricher_with_store(
        generation: GenerationProvider,
    ) -> (tempfile::TempDir, DescriptionEnricher, Arc<dyn DatabaseBackend>) {
        let dir = tempdir().expect("tempdir");
        let config = DatabaseConfig {
            url: format!("file:{}", dir.path().join("enrich.db").display()),
            auth_token: None,
            local_path: None,
        };
        let db = Database::new(&config).await.expect("database");
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));
        let enricher = DescriptionEnricher::new(backend.clone(), generation, 64, 4);
        (dir, enricher, backend)
    }

    #[tokio::test]
    async fn cached_dishes_skip_generation_entirely() {
        let (_dir, enricher, store) =
            enricher_with_store(GenerationProvider::unavailable("test")).await;

        store
            .save_explanation(&CachedExplanation::new(
                "Margherita Pizza",
                "en",
                "Classic Italian pizza...",
            ))
            .await
            .expect("save");

        let mut dishes = vec![Dish::new("Margherita Pizza", 0.9)];
        let report = enricher.enrich(&mut dishes, "en").await;

        assert_eq!(
            dishes[0].explanation.as_deref(),
            Some("Classic Italian pizza...")
        );
        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.generated, 0);
        assert_eq!(report.missing, 0);
    }

    #[tokio::test]
    async fn fuzzy_match_resolves_partial_names() {
        let (_dir, enricher, store) =
            enricher_with_store(GenerationProvider::unavailable("test")).await;

        store
            .save_explanation(&CachedExplanation::new(
                "Spaghetti Carbonara",
                "en",
                "Roman pasta dish.",
            ))
            .await
            .expect("save");

        let mut dishes = vec![Dish::new("Carbonara", 0.7)];
        let report = enricher.enrich(&mut dishes, "en").await;

        assert_eq!(dishes[0].explanation.as_deref(), Some("Roman pasta dish."));
        assert_eq!(report.cache_hits, 1);
    }

    #[tokio::test]
    async fn unavailable_generation_counts_missing() {
        let (_dir, enricher, _store) =
            enricher_with_store(GenerationProvider::unavailable("test")).await;

        let mut dishes = vec![Dish::new("Mystery Dish", 0.7), Dish::new("Another One", 0.7)];
        let report = enricher.enrich(&mut dishes, "en").await;

        assert!(dishes.iter().all(|d| d.explanation.is_none()));
        assert_eq!(report.missing, 2);
        assert_eq!(report.generated, 0);
    }

    #[tokio::test]
    async fn explain_single_prefers_cache_and_reports_source() {
        let (_dir, enricher, store) =
            enricher_with_store(GenerationProvider::unavailable("test")).await;

        store
            .save_explanation(&CachedExplanation::new("Tiramisu", "en", "Coffee dessert."))
            .await
            .expect("save");

        let (text, source) = enricher
            .explain_single("Tiramisu", None, &Default::default(), "en")
            .await
            .expect("explain");
        assert_eq!(text, "Coffee dessert.");
        assert_eq!(source, ExplanationSource::Cache);
    }

    #[tokio::test]
    async fn explain_single_without_any_source_errors() {
        let (_dir, enricher, _store) =
            enricher_with_store(GenerationProvider::unavailable("test")).await;

        let result = enricher
            .explain_single("Unknown Dish", None, &Default::default(), "en")
            .await;
        assert!(matches!(result, Err(ScanError::GenerationUnavailable(_))));
    }
}
