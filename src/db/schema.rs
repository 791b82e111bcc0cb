use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_status (
                article_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_notification_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_article_status_status ON article_status (status);

            CREATE TABLE IF NOT EXISTS article_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                abstract TEXT NOT NULL,
                author TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                captured_at TEXT NOT NULL,
                UNIQUE(article_id, version)
            );
            CREATE INDEX IF NOT EXISTS idx_article_versions_article_id ON article_versions (article_id);
            CREATE INDEX IF NOT EXISTS idx_article_versions_fingerprint ON article_versions (fingerprint);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
