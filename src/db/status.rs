use sqlx::Row;
use tracing::debug;

use super::core::{parse_timestamp, Database};
use crate::article::{ArticleStatus, StatusRecord};
use crate::TARGET_DB;

impl Database {
    /// Look up the status record for an article, if one exists.
    pub async fn status(&self, article_id: &str) -> Result<Option<StatusRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT article_id, status, first_seen, last_notification_id
            FROM article_status
            WHERE article_id = ?1
            "#,
        )
        .bind(article_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| {
            let status: String = row.get("status");
            let status = status
                .parse::<ArticleStatus>()
                .map_err(|err| sqlx::Error::ColumnDecode {
                    index: "status".to_string(),
                    source: Box::new(err),
                })?;
            let first_seen: String = row.get("first_seen");
            Ok(StatusRecord {
                article_id: row.get("article_id"),
                status,
                first_seen: parse_timestamp(&first_seen, "first_seen")?,
                last_notification_id: row.get("last_notification_id"),
            })
        })
        .transpose()
    }

    /// Flip an article's status.
    pub async fn set_status(
        &self,
        article_id: &str,
        status: ArticleStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE article_status SET status = ?2 WHERE article_id = ?1
            "#,
        )
        .bind(article_id)
        .bind(status.as_str())
        .execute(self.pool())
        .await?;
        debug!(target: TARGET_DB, "Status of {} set to {}", article_id, status.as_str());
        Ok(())
    }

    /// Record the latest notification id for an article's reply chain.
    pub async fn set_notification_id(
        &self,
        article_id: &str,
        notification_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE article_status SET last_notification_id = ?2 WHERE article_id = ?1
            "#,
        )
        .bind(article_id)
        .bind(notification_id)
        .execute(self.pool())
        .await?;
        debug!(target: TARGET_DB, "Updated notification id for {}", article_id);
        Ok(())
    }

    /// All article ids currently marked home.
    pub async fn home_article_ids(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT article_id FROM article_status WHERE status = ?1
            "#,
        )
        .bind(ArticleStatus::Home.as_str())
        .fetch_all(self.pool())
        .await
    }
}
