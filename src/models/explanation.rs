use serde::{Deserialize, Serialize};

/// A persisted dish explanation, keyed by (name, language). Written once on
/// a cache miss with successful generation; read-only afterward from this
/// service's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedExplanation {
    pub name: String,
    pub language: String,
    pub explanation: String,
}

impl CachedExplanation {
    pub fn new(
        name: impl Into<String>,
        language: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            explanation: explanation.into(),
        }
    }
}
