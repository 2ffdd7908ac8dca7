use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::connection::Database;
use crate::db::repository::{ExplanationRepository, QuotaRepository};
use crate::db::traits::{DatabaseBackend, ExplanationStore, QuotaStore};
use crate::error::Result;
use crate::models::{CachedExplanation, OwnerKind, QuotaUsage, Tier};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExplanationStore for LibSqlBackend {
    async fn lookup_many(
        &self,
        names: &[String],
        language: &str,
    ) -> Result<HashMap<String, String>> {
        let conn = self.db.connect()?;
        ExplanationRepository::lookup_many(&conn, names, language).await
    }

    async fn list_by_language(&self, language: &str) -> Result<Vec<CachedExplanation>> {
        let conn = self.db.connect()?;
        ExplanationRepository::list_by_language(&conn, language).await
    }

    async fn save_explanation(&self, explanation: &CachedExplanation) -> Result<()> {
        let conn = self.db.connect()?;
        ExplanationRepository::upsert(&conn, explanation).await
    }
}

#[async_trait]
impl QuotaStore for LibSqlBackend {
    async fn get_usage(&self, owner_id: &str) -> Result<Option<QuotaUsage>> {
        let conn = self.db.connect()?;
        QuotaRepository::get(&conn, owner_id).await
    }

    async fn ensure_owner(&self, owner_id: &str, owner_kind: OwnerKind) -> Result<()> {
        let conn = self.db.connect()?;
        QuotaRepository::ensure(&conn, owner_id, owner_kind).await
    }

    async fn try_increment(&self, owner_id: &str, limit: Option<u32>) -> Result<bool> {
        let conn = self.db.connect()?;
        QuotaRepository::try_increment(&conn, owner_id, limit).await
    }

    async fn grant_pass(
        &self,
        owner_id: &str,
        owner_kind: OwnerKind,
        tier: Tier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.db.connect()?;
        QuotaRepository::grant_pass(&conn, owner_id, owner_kind, tier, expires_at).await
    }
}

impl DatabaseBackend for LibSqlBackend {}
