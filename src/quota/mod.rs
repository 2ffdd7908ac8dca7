//! Tier-based scan metering.
//!
//! `authorize` answers without touching the counter; `record_usage` runs
//! only after a scan fully succeeds and relies on the store's conditional
//! increment, so concurrent requests cannot push `used` past the limit by
//! more than the inherent one-request race window.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::config::QuotaConfig;
use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::models::{OwnerKind, QuotaDecision, QuotaUsage};

#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn DatabaseBackend>,
    free_scan_limit: u32,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn DatabaseBackend>, config: &QuotaConfig) -> Self {
        Self {
            store,
            free_scan_limit: config.free_scan_limit,
        }
    }

    pub fn free_scan_limit(&self) -> u32 {
        self.free_scan_limit
    }

    /// Check the owner's allowance. Creates the usage record on an owner's
    /// first scan attempt but never increments it.
    pub async fn authorize(&self, owner_id: &str, owner_kind: OwnerKind) -> Result<QuotaDecision> {
        self.store.ensure_owner(owner_id, owner_kind).await?;
        let usage = self
            .store
            .get_usage(owner_id)
            .await?
            .unwrap_or_else(|| self.fresh_usage(owner_id, owner_kind));

        Ok(self.decide(&usage))
    }

    /// Current usage for status display.
    pub async fn usage(&self, owner_id: &str) -> Result<Option<QuotaUsage>> {
        self.store.get_usage(owner_id).await
    }

    /// Count one successful scan. Returns false when the conditional
    /// increment lost a race against the limit, in which case the counter
    /// is already saturated and stays put.
    pub async fn record_usage(&self, owner_id: &str, owner_kind: OwnerKind) -> Result<bool> {
        self.store.ensure_owner(owner_id, owner_kind).await?;
        let usage = self
            .store
            .get_usage(owner_id)
            .await?
            .unwrap_or_else(|| self.fresh_usage(owner_id, owner_kind));

        let limit = if usage.has_active_pass(Utc::now()) {
            None
        } else {
            Some(self.free_scan_limit)
        };

        let updated = self.store.try_increment(owner_id, limit).await?;
        debug!(owner_id = %owner_id, updated, "Recorded scan usage");
        Ok(updated)
    }

    fn decide(&self, usage: &QuotaUsage) -> QuotaDecision {
        if usage.has_active_pass(Utc::now()) {
            return QuotaDecision {
                allowed: true,
                remaining: None,
            };
        }

        let remaining = self.free_scan_limit.saturating_sub(usage.used);
        QuotaDecision {
            allowed: remaining > 0,
            remaining: Some(remaining),
        }
    }

    fn fresh_usage(&self, owner_id: &str, owner_kind: OwnerKind) -> QuotaUsage {
        QuotaUsage {
            owner_id: owner_id.to_string(),
            owner_kind,
            tier: crate::models::Tier::Free,
            used: 0,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, LibSqlBackend, QuotaStore};
    use crate::models::Tier;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn gate(limit: u32) -> (tempfile::TempDir, QuotaGate, Arc<dyn DatabaseBackend>) {
        let dir = tempdir().expect("tempdir");
        let config = DatabaseConfig {
            url: format!("file:{}", dir.path().join("gate.db").display()),
            auth_token: None,
            local_path: None,
        };
        let db = Database::new(&config).await.expect("database");
        let backend: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(db));
        let gate = QuotaGate::new(backend.clone(), &QuotaConfig { free_scan_limit: limit });
        (dir, gate, backend)
    }

    #[tokio::test]
    async fn fresh_owner_gets_full_allowance() {
        let (_dir, gate, _store) = gate(5).await;
        let decision = gate.authorize("sess-1", OwnerKind::Session).await.expect("authorize");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(5));
    }

    #[tokio::test]
    async fn exhausted_free_owner_is_denied_with_zero_remaining() {
        let (_dir, gate, _store) = gate(5).await;

        for _ in 0..5 {
            assert!(gate.record_usage("sess-2", OwnerKind::Session).await.expect("record"));
        }

        let decision = gate.authorize("sess-2", OwnerKind::Session).await.expect("authorize");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Some(0));
    }

    #[tokio::test]
    async fn authorize_never_consumes_allowance() {
        let (_dir, gate, _store) = gate(5).await;

        for _ in 0..10 {
            gate.authorize("sess-3", OwnerKind::Session).await.expect("authorize");
        }

        let decision = gate.authorize("sess-3", OwnerKind::Session).await.expect("authorize");
        assert_eq!(decision.remaining, Some(5));
    }

    #[tokio::test]
    async fn active_pass_is_unlimited() {
        let (_dir, gate, store) = gate(5).await;

        store
            .grant_pass(
                "user-1",
                OwnerKind::User,
                Tier::DailyPass,
                Some(Utc::now() + Duration::hours(24)),
            )
            .await
            .expect("grant");

        for _ in 0..20 {
            assert!(gate.record_usage("user-1", OwnerKind::User).await.expect("record"));
        }

        let decision = gate.authorize("user-1", OwnerKind::User).await.expect("authorize");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, None);
    }

    #[tokio::test]
    async fn expired_pass_falls_back_to_free_limits() {
        let (_dir, gate, store) = gate(5).await;

        store
            .grant_pass(
                "user-2",
                OwnerKind::User,
                Tier::WeeklyPass,
                Some(Utc::now() - Duration::hours(1)),
            )
            .await
            .expect("grant");

        let decision = gate.authorize("user-2", OwnerKind::User).await.expect("authorize");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(5));
    }

    #[tokio::test]
    async fn counter_never_exceeds_the_limit() {
        let (_dir, gate, store) = gate(3).await;

        for _ in 0..10 {
            gate.record_usage("sess-4", OwnerKind::Session).await.expect("record");
        }

        let usage = store.get_usage("sess-4").await.expect("get").expect("row");
        assert_eq!(usage.used, 3);
    }
}
