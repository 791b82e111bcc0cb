use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use super::core::{parse_timestamp, Database};
use crate::article::{ArticleSnapshot, ArticleStatus, StoredVersion};
use crate::TARGET_DB;

impl Database {
    /// Latest stored version for an article.
    pub async fn latest_version(
        &self,
        article_id: &str,
    ) -> Result<Option<StoredVersion>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT version, article_id, url, title, abstract, author, fingerprint, captured_at
            FROM article_versions
            WHERE article_id = ?1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(article_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(stored_version_from_row).transpose()
    }

    /// Full version history for an article, oldest first.
    pub async fn versions(&self, article_id: &str) -> Result<Vec<StoredVersion>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT version, article_id, url, title, abstract, author, fingerprint, captured_at
            FROM article_versions
            WHERE article_id = ?1
            ORDER BY version ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(stored_version_from_row).collect()
    }

    /// First sighting: insert the status row and version 1 in one transaction.
    pub async fn insert_new_article(&self, snapshot: &ArticleSnapshot) -> Result<(), sqlx::Error> {
        let mut transaction = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO article_status (article_id, status, first_seen, last_notification_id)
            VALUES (?1, ?2, ?3, NULL)
            "#,
        )
        .bind(&snapshot.article_id)
        .bind(ArticleStatus::Home.as_str())
        .bind(snapshot.captured_at.to_rfc3339())
        .execute(&mut *transaction)
        .await?;

        insert_version(&mut transaction, snapshot, 1).await?;

        transaction.commit().await?;
        debug!(target: TARGET_DB, "Inserted {} at version 1", snapshot.article_id);
        Ok(())
    }

    /// Append a changed snapshot and flip the article back home, in one
    /// transaction.
    pub async fn append_changed_version(
        &self,
        snapshot: &ArticleSnapshot,
        version: i64,
    ) -> Result<(), sqlx::Error> {
        let mut transaction = self.pool().begin().await?;

        insert_version(&mut transaction, snapshot, version).await?;

        sqlx::query(
            r#"
            UPDATE article_status SET status = ?2 WHERE article_id = ?1
            "#,
        )
        .bind(&snapshot.article_id)
        .bind(ArticleStatus::Home.as_str())
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        debug!(target: TARGET_DB, "Appended {} at version {}", snapshot.article_id, version);
        Ok(())
    }
}

async fn insert_version(
    transaction: &mut Transaction<'_, Sqlite>,
    snapshot: &ArticleSnapshot,
    version: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO article_versions (article_id, version, url, title, abstract, author, fingerprint, captured_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&snapshot.article_id)
    .bind(version)
    .bind(&snapshot.url)
    .bind(&snapshot.title)
    .bind(&snapshot.abstract_text)
    .bind(&snapshot.author)
    .bind(&snapshot.fingerprint)
    .bind(snapshot.captured_at.to_rfc3339())
    .execute(&mut **transaction)
    .await?;
    Ok(())
}

fn stored_version_from_row(row: SqliteRow) -> Result<StoredVersion, sqlx::Error> {
    let captured_at: String = row.get("captured_at");
    Ok(StoredVersion {
        version: row.get("version"),
        snapshot: ArticleSnapshot {
            article_id: row.get("article_id"),
            url: row.get("url"),
            title: row.get("title"),
            abstract_text: row.get("abstract"),
            author: row.get("author"),
            fingerprint: row.get("fingerprint"),
            captured_at: parse_timestamp(&captured_at, "captured_at")?,
        },
    })
}
