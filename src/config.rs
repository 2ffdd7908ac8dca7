use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_list(var: &str) -> Vec<String> {
    env::var(var)
        .map(|val| {
            val.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ocr: OcrConfig,
    pub generation: Option<GenerationConfig>,
    pub quota: QuotaConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// One configured OCR engine. `engine` is a provider/model string such as
/// `google/vision` or `ocrspace/engine2`.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrEngineConfig {
    pub engine: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub primary: OcrEngineConfig,
    pub fallback: Option<OcrEngineConfig>,
    /// Comma-separated BCP-47 language hints forwarded to the engines.
    pub languages: String,
    pub attempt_timeout_secs: u64,
    pub max_retries: u32,
    /// Extraction shorter than this is treated as a failed attempt.
    pub min_text_chars: usize,
    /// Primary confidence below this triggers the fallback engine.
    pub min_confidence: f32,
    pub max_image_dimension: u32,
    pub min_image_dimension: u32,
}

/// Generation (dish explanation) configuration. Absent when no model is set;
/// enrichment then degrades to cache-only.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Worker pool size for per-dish generation calls.
    pub max_concurrency: usize,
    /// Soft word cap passed into the explanation prompt.
    pub max_words: usize,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Lifetime scan allowance for free-tier owners.
    pub free_scan_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Overall wall-clock budget for one scan request.
    pub overall_budget_secs: u64,
    /// Extra section-header keywords merged into the segmenter defaults,
    /// for localized menus.
    pub extra_section_keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("MENULENS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("MENULENS_PORT", 3000),
                api_keys: parse_env_list("MENULENS_API_KEYS"),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:menulens.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            ocr: OcrConfig {
                primary: OcrEngineConfig {
                    engine: env::var("OCR_PRIMARY_ENGINE")
                        .unwrap_or_else(|_| "google/vision".to_string()),
                    api_key: env::var("OCR_PRIMARY_API_KEY").ok(),
                    base_url: env::var("OCR_PRIMARY_BASE_URL").ok(),
                },
                fallback: env::var("OCR_FALLBACK_ENGINE").ok().map(|engine| {
                    OcrEngineConfig {
                        engine,
                        api_key: env::var("OCR_FALLBACK_API_KEY").ok(),
                        base_url: env::var("OCR_FALLBACK_BASE_URL").ok(),
                    }
                }),
                languages: env::var("OCR_LANGUAGES").unwrap_or_else(|_| "en".to_string()),
                attempt_timeout_secs: parse_env_or("OCR_ATTEMPT_TIMEOUT", 15),
                max_retries: parse_env_or("OCR_MAX_RETRIES", 1),
                min_text_chars: parse_env_or("OCR_MIN_TEXT_CHARS", 10),
                min_confidence: parse_env_or("OCR_MIN_CONFIDENCE", 40.0),
                max_image_dimension: parse_env_or("OCR_MAX_DIMENSION", 4096),
                min_image_dimension: parse_env_or("OCR_MIN_DIMENSION", 50),
            },
            generation: env::var("GENERATION_MODEL").ok().map(|model| GenerationConfig {
                model,
                api_key: env::var("GENERATION_API_KEY").ok(),
                base_url: env::var("GENERATION_BASE_URL").ok(),
                timeout_secs: parse_env_or("GENERATION_TIMEOUT", 10),
                max_retries: parse_env_or("GENERATION_MAX_RETRIES", 1),
                max_concurrency: parse_env_or("GENERATION_MAX_CONCURRENCY", 4),
                max_words: parse_env_or("GENERATION_MAX_WORDS", 60),
                cache_size: parse_env_or("EXPLANATION_CACHE_SIZE", 1024),
            }),
            quota: QuotaConfig {
                free_scan_limit: parse_env_or("QUOTA_FREE_SCAN_LIMIT", 5),
            },
            scan: ScanConfig {
                overall_budget_secs: parse_env_or("SCAN_BUDGET_SECS", 45),
                extra_section_keywords: parse_env_list("SEGMENTER_EXTRA_KEYWORDS"),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known OCR engine providers.
pub const KNOWN_OCR_PROVIDERS: &[&str] = &["google", "ocrspace"];

/// Known generation providers that speak the OpenAI-compatible API.
pub const KNOWN_GENERATION_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an engine/model string into a (provider, model) tuple.
pub fn parse_provider_model<'a>(value: &'a str, known: &[&str]) -> (&'a str, &'a str) {
    if let Some((prefix, rest)) = value.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if known.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("", value)
}
