use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Persisted dish explanations, keyed by (name, language)
        CREATE TABLE IF NOT EXISTS explanations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            language TEXT NOT NULL,
            explanation TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(name, language)
        );

        CREATE INDEX IF NOT EXISTS idx_explanations_language ON explanations(language);

        -- Per-owner scan counters and subscription state
        CREATE TABLE IF NOT EXISTS quota_usage (
            owner_id TEXT PRIMARY KEY,
            owner_kind TEXT NOT NULL DEFAULT 'session',
            tier TEXT NOT NULL DEFAULT 'free',
            used INTEGER NOT NULL DEFAULT 0,
            expires_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quota_usage_tier ON quota_usage(tier);
        "#,
    )
    .await?;

    Ok(())
}
