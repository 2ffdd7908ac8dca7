use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menulens::api::{create_router, AppState};
use menulens::config::Config;
use menulens::db::{Database, DatabaseBackend, ExplanationStore, LibSqlBackend};
use menulens::llm::GenerationProvider;
use menulens::models::CachedExplanation;
use menulens::ocr::{OcrProvider, TextExtractor};

#[derive(Parser)]
#[command(name = "menulens")]
#[command(about = "Self-hostable menu scanning and explanation service")]
struct Args {
    /// Seed the explanation cache from a JSON file and exit
    #[arg(long, value_name = "FILE")]
    seed_explanations: Option<std::path::PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SeedEntry {
    name: String,
    #[serde(default = "default_seed_language")]
    language: String,
    explanation: String,
}

fn default_seed_language() -> String {
    "en".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menulens=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.server.api_keys.is_empty() {
        tracing::warn!(
            "MENULENS_API_KEYS is not set — admin endpoints are locked. Set MENULENS_API_KEYS to enable /admin/* routes."
        );
    }

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));

    if let Some(path) = &args.seed_explanations {
        let inserted = seed_explanations(&*db, path).await?;
        tracing::info!("Seeded {} explanations from {}", inserted, path.display());
        return Ok(());
    }

    tracing::info!("Initializing primary OCR engine: {}...", config.ocr.primary.engine);
    let primary = OcrProvider::new(&config.ocr.primary, &config.ocr);
    if !primary.is_available() {
        tracing::warn!("Primary OCR engine unavailable - scans will rely on the fallback");
    }

    let fallback = config.ocr.fallback.as_ref().map(|engine_config| {
        tracing::info!("Initializing fallback OCR engine: {}...", engine_config.engine);
        OcrProvider::new(engine_config, &config.ocr)
    });
    if fallback.is_none() {
        tracing::info!("No fallback OCR engine configured");
    }

    if let Some(generation_config) = &config.generation {
        tracing::info!("Initializing generation provider: {}...", generation_config.model);
    }
    let generation = GenerationProvider::new(config.generation.as_ref());
    if !generation.is_available() {
        tracing::warn!("Generation unavailable - enrichment will be cache-only");
    }

    let state = AppState::new(config.clone(), db, primary, fallback, generation);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Menulens starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  Scan:         POST http://{}/api/v1/scan", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn seed_explanations(store: &dyn DatabaseBackend, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path).await?;
    let entries: Vec<SeedEntry> = serde_json::from_str(&raw)?;

    let mut inserted = 0;
    for entry in entries {
        let record = CachedExplanation::new(entry.name, entry.language, entry.explanation);
        store.save_explanation(&record).await?;
        inserted += 1;
    }
    Ok(inserted)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
