use std::collections::HashMap;

use chrono::Utc;
use libsql::{params, Connection};
use nanoid::nanoid;

use crate::error::Result;
use crate::models::CachedExplanation;

pub struct ExplanationRepository;

impl ExplanationRepository {
    /// Insert or refresh one explanation. The (name, language) pair is
    /// unique; re-saving updates the text in place.
    pub async fn upsert(conn: &Connection, explanation: &CachedExplanation) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO explanations (id, name, language, explanation, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name, language)
            DO UPDATE SET explanation = excluded.explanation
            "#,
            params![
                nanoid!(),
                explanation.name.clone(),
                explanation.language.clone(),
                explanation.explanation.clone(),
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    /// Exact batch lookup. Returns a map keyed by the stored name,
    /// lowercased.
    pub async fn lookup_many(
        conn: &Connection,
        names: &[String],
        language: &str,
    ) -> Result<HashMap<String, String>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let mut placeholders = String::new();
        for i in 0..names.len() {
            if i > 0 {
                placeholders.push_str(", ");
            }
            placeholders.push('?');
            placeholders.push_str(&(i + 2).to_string());
        }

        let sql = format!(
            "SELECT name, explanation FROM explanations \
             WHERE language = ?1 AND lower(name) IN ({placeholders})"
        );

        let mut values: Vec<libsql::Value> = vec![libsql::Value::from(language.to_string())];
        values.extend(
            names
                .iter()
                .map(|n| libsql::Value::from(n.to_lowercase())),
        );

        let mut rows = conn.query(&sql, libsql::params_from_iter(values)).await?;
        let mut results = HashMap::new();
        while let Some(row) = rows.next().await? {
            let name: String = row.get(0)?;
            let explanation: String = row.get(1)?;
            results.insert(name.to_lowercase(), explanation);
        }
        Ok(results)
    }

    /// All explanations for a language in insertion order. Fuzzy-match ties
    /// resolve to the earliest stored row.
    pub async fn list_by_language(
        conn: &Connection,
        language: &str,
    ) -> Result<Vec<CachedExplanation>> {
        let mut rows = conn
            .query(
                "SELECT name, language, explanation FROM explanations \
                 WHERE language = ?1 ORDER BY rowid",
                params![language],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(CachedExplanation {
                name: row.get(0)?,
                language: row.get(1)?,
                explanation: row.get(2)?,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::Database;
    use tempfile::tempdir;

    async fn test_conn() -> (tempfile::TempDir, Connection) {
        let dir = tempdir().expect("tempdir");
        let config = DatabaseConfig {
            url: format!("file:{}", dir.path().join("explanations.db").display()),
            auth_token: None,
            local_path: None,
        };
        let db = Database::new(&config).await.expect("database");
        let conn = db.connect().expect("connection");
        (dir, conn)
    }

    #[tokio::test]
    async fn upsert_then_exact_lookup() {
        let (_dir, conn) = test_conn().await;

        ExplanationRepository::upsert(
            &conn,
            &CachedExplanation::new("Margherita Pizza", "en", "Classic Italian pizza..."),
        )
        .await
        .expect("upsert");

        let found = ExplanationRepository::lookup_many(
            &conn,
            &["margherita pizza".to_string()],
            "en",
        )
        .await
        .expect("lookup");

        assert_eq!(
            found.get("margherita pizza").map(String::as_str),
            Some("Classic Italian pizza...")
        );
    }

    #[tokio::test]
    async fn lookup_is_language_scoped() {
        let (_dir, conn) = test_conn().await;

        ExplanationRepository::upsert(
            &conn,
            &CachedExplanation::new("Pad Thai", "en", "Stir-fried noodles."),
        )
        .await
        .expect("upsert");

        let found =
            ExplanationRepository::lookup_many(&conn, &["pad thai".to_string()], "fr")
                .await
                .expect("lookup");
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn re_saving_updates_in_place() {
        let (_dir, conn) = test_conn().await;

        ExplanationRepository::upsert(&conn, &CachedExplanation::new("Tiramisu", "en", "v1"))
            .await
            .expect("upsert");
        ExplanationRepository::upsert(&conn, &CachedExplanation::new("Tiramisu", "en", "v2"))
            .await
            .expect("upsert");

        let all = ExplanationRepository::list_by_language(&conn, "en")
            .await
            .expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].explanation, "v2");
    }

    #[tokio::test]
    async fn list_preserves_insertion_order() {
        let (_dir, conn) = test_conn().await;

        for name in ["Caesar Salad", "Beef Burger", "Sushi Roll"] {
            ExplanationRepository::upsert(&conn, &CachedExplanation::new(name, "en", "..."))
                .await
                .expect("upsert");
        }

        let all = ExplanationRepository::list_by_language(&conn, "en")
            .await
            .expect("list");
        let names: Vec<&str> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Caesar Salad", "Beef Burger", "Sushi Roll"]);
    }
}
