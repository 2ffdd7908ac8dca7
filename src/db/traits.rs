use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{CachedExplanation, OwnerKind, QuotaUsage, Tier};

/// Read/write contract for the persisted explanation cache.
#[async_trait]
pub trait ExplanationStore: Send + Sync {
    /// Exact (case-insensitive) batch lookup, name → explanation.
    async fn lookup_many(
        &self,
        names: &[String],
        language: &str,
    ) -> Result<HashMap<String, String>>;

    /// All entries for a language in first-encountered-in-store order,
    /// used by the fuzzy matcher.
    async fn list_by_language(&self, language: &str) -> Result<Vec<CachedExplanation>>;

    async fn save_explanation(&self, explanation: &CachedExplanation) -> Result<()>;
}

/// Read/write contract for quota tracking. Counters only grow; rows are
/// never deleted by this service.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get_usage(&self, owner_id: &str) -> Result<Option<QuotaUsage>>;

    /// Create the owner's record if it does not exist yet.
    async fn ensure_owner(&self, owner_id: &str, owner_kind: OwnerKind) -> Result<()>;

    /// Atomic conditional increment: bumps `used` only while it is below
    /// `limit` (`None` = unlimited). Returns whether a row was updated.
    async fn try_increment(&self, owner_id: &str, limit: Option<u32>) -> Result<bool>;

    /// Record a purchased pass on an owner.
    async fn grant_pass(
        &self,
        owner_id: &str,
        owner_kind: OwnerKind,
        tier: Tier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// The combined storage surface the service is wired against.
pub trait DatabaseBackend: ExplanationStore + QuotaStore + Send + Sync {}
