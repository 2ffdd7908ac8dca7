use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{OwnerKind, QuotaUsage, Tier};

pub struct QuotaRepository;

impl QuotaRepository {
    pub async fn get(conn: &Connection, owner_id: &str) -> Result<Option<QuotaUsage>> {
        let mut rows = conn
            .query(
                "SELECT owner_id, owner_kind, tier, used, expires_at \
                 FROM quota_usage WHERE owner_id = ?1",
                params![owner_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_usage(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Create the owner's row on first contact; later calls are no-ops.
    pub async fn ensure(conn: &Connection, owner_id: &str, owner_kind: OwnerKind) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT OR IGNORE INTO quota_usage
                (owner_id, owner_kind, tier, used, expires_at, created_at, updated_at)
            VALUES (?1, ?2, 'free', 0, NULL, ?3, ?3)
            "#,
            params![owner_id, owner_kind.to_string(), now],
        )
        .await?;

        Ok(())
    }

    /// Conditional check-and-increment in a single statement. With a limit,
    /// the update only lands while `used < limit`, so concurrent callers
    /// cannot push the counter past it.
    pub async fn try_increment(
        conn: &Connection,
        owner_id: &str,
        limit: Option<u32>,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let affected = match limit {
            Some(limit) => {
                conn.execute(
                    "UPDATE quota_usage SET used = used + 1, updated_at = ?2 \
                     WHERE owner_id = ?1 AND used < ?3",
                    params![owner_id, now, limit as i64],
                )
                .await?
            }
            None => {
                conn.execute(
                    "UPDATE quota_usage SET used = used + 1, updated_at = ?2 \
                     WHERE owner_id = ?1",
                    params![owner_id, now],
                )
                .await?
            }
        };

        Ok(affected == 1)
    }

    /// Record a purchased pass. The usage counter carries over; only the
    /// tier and expiry change.
    pub async fn grant_pass(
        conn: &Connection,
        owner_id: &str,
        owner_kind: OwnerKind,
        tier: Tier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO quota_usage
                (owner_id, owner_kind, tier, used, expires_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)
            ON CONFLICT(owner_id) DO UPDATE SET
                tier = excluded.tier,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
            params![
                owner_id,
                owner_kind.to_string(),
                tier.to_string(),
                expires_at.map(|at| at.to_rfc3339()),
                now,
            ],
        )
        .await?;

        Ok(())
    }

    fn row_to_usage(row: &libsql::Row) -> Result<QuotaUsage> {
        let owner_kind: String = row.get(1)?;
        let tier: String = row.get(2)?;
        let used: i64 = row.get(3)?;
        let expires_at: Option<String> = row.get(4)?;

        Ok(QuotaUsage {
            owner_id: row.get(0)?,
            owner_kind: owner_kind.parse().unwrap_or(OwnerKind::Session),
            tier: tier.parse().unwrap_or(Tier::Free),
            used: used.max(0) as u32,
            expires_at: expires_at
                .and_then(|at| DateTime::parse_from_rfc3339(&at).ok())
                .map(|at| at.with_timezone(&Utc)),
        })
    }
}
