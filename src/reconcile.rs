//! The change-detection core: classifies each polled snapshot against stored
//! history, maintains the per-article version chain, and drives change
//! notifications and the post-poll liveness sweep.

use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::article::{ArticleSnapshot, ArticleStatus, ChangeEvent, ChangedField};
use crate::db::Database;
use crate::diff::DiffRenderer;
use crate::notify::Notifier;
use crate::{TARGET_DB, TARGET_WEB_REQUEST};

/// Classification of one polled snapshot against stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    New,
    Unchanged,
    Changed(usize),
}

pub struct Reconciler<'a> {
    db: &'a Database,
    notifier: &'a Notifier,
    renderer: &'a DiffRenderer,
    handle: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        db: &'a Database,
        notifier: &'a Notifier,
        renderer: &'a DiffRenderer,
        handle: &'a str,
    ) -> Self {
        Self {
            db,
            notifier,
            renderer,
            handle,
        }
    }

    /// Classify one candidate snapshot and apply its side effects.
    ///
    /// NEW inserts the status row and version 1 without notifying. UNCHANGED
    /// writes nothing, so re-delivery of the same candidate is idempotent.
    /// CHANGED appends the next version, re-activates a removed article, and
    /// hands one change-event per differing field to the notifier.
    pub async fn reconcile(&self, candidate: &ArticleSnapshot) -> Result<Outcome, sqlx::Error> {
        if candidate.article_id.is_empty() || candidate.fingerprint.is_empty() {
            error!(target: TARGET_DB, "Rejecting candidate with empty id or fingerprint");
            return Err(sqlx::Error::Protocol(
                "empty article id or fingerprint".into(),
            ));
        }

        let record = match self.db.status(&candidate.article_id).await? {
            None => {
                self.db.insert_new_article(candidate).await?;
                info!(target: TARGET_DB, "New article tracked: {}", candidate.url);
                return Ok(Outcome::New);
            }
            Some(record) => record,
        };

        let Some(latest) = self.db.latest_version(&candidate.article_id).await? else {
            error!(
                target: TARGET_DB,
                "Status row for {} has no version chain", candidate.article_id
            );
            return Err(sqlx::Error::RowNotFound);
        };

        if latest.snapshot.fingerprint == candidate.fingerprint {
            debug!(target: TARGET_DB, "Article {} unchanged", candidate.article_id);
            return Ok(Outcome::Unchanged);
        }

        let version = latest.version + 1;
        self.db.append_changed_version(candidate, version).await?;
        if record.status == ArticleStatus::Removed {
            info!(target: TARGET_DB, "Article {} reappeared, back home", candidate.article_id);
        }

        let events = change_events(&latest.snapshot, candidate);
        info!(
            target: TARGET_DB,
            "Article {} changed: version {}, {} field(s)",
            candidate.article_id,
            version,
            events.len()
        );
        for event in &events {
            self.notify_change(event).await;
        }

        Ok(Outcome::Changed(events.len()))
    }

    /// Render and post one change-event, threaded onto the article's chain.
    ///
    /// Failures are logged and swallowed: a rendering or posting error never
    /// aborts the remaining change-events, and the version row written by
    /// [`Self::reconcile`] stays in place.
    async fn notify_change(&self, event: &ChangeEvent) {
        let image = match self
            .renderer
            .render_diff(&event.old_value, &event.new_value)
            .await
        {
            Ok(image) => image,
            Err(err) => {
                warn!(
                    target: TARGET_WEB_REQUEST,
                    "Skipping notification for {} {}: {}",
                    event.article_id,
                    event.field.name(),
                    err
                );
                return;
            }
        };

        let text = if self.handle.is_empty() {
            format!("{} changed", event.field.label())
        } else {
            format!("{} changed @{}", event.field.label(), self.handle)
        };

        let previous = match self.db.status(&event.article_id).await {
            Ok(record) => record.and_then(|record| record.last_notification_id),
            Err(err) => {
                error!(target: TARGET_DB, "Failed to load reply chain for {}: {}", event.article_id, err);
                return;
            }
        };

        // No chain yet: anchor it with a root post carrying the article URL.
        let anchor = match previous {
            Some(id) => id,
            None => match self.notifier.post_text(&event.canonical_url).await {
                Ok(id) => id,
                Err(err) => {
                    error!(
                        target: TARGET_WEB_REQUEST,
                        "Root post failed for {}: {}", event.canonical_url, err
                    );
                    return;
                }
            },
        };

        match self.notifier.post_media(&text, &image, Some(&anchor)).await {
            Ok(notification_id) => {
                debug!(target: TARGET_WEB_REQUEST, "Posted {} for {}", notification_id, event.article_id);
                if let Err(err) = self
                    .db
                    .set_notification_id(&event.article_id, &notification_id)
                    .await
                {
                    error!(
                        target: TARGET_DB,
                        "Failed to record notification id for {}: {}", event.article_id, err
                    );
                }
            }
            Err(err) => {
                error!(
                    target: TARGET_WEB_REQUEST,
                    "Media post failed for {} {}: {}",
                    event.article_id,
                    event.field.name(),
                    err
                );
            }
        }
    }
}

/// One change-event per field that differs between consecutive versions.
pub fn change_events(old: &ArticleSnapshot, new: &ArticleSnapshot) -> Vec<ChangeEvent> {
    ChangedField::ALL
        .iter()
        .filter_map(|&field| {
            let old_value = old.field(field);
            let new_value = new.field(field);
            (old_value != new_value).then(|| ChangeEvent {
                article_id: new.article_id.clone(),
                field,
                old_value: old_value.to_string(),
                new_value: new_value.to_string(),
                canonical_url: new.url.clone(),
            })
        })
        .collect()
}

/// Flip every home article absent from the current poll to removed.
///
/// Must only run after a feed's entry loop completed without error.
pub async fn sweep_removed(
    db: &Database,
    current_ids: &HashSet<String>,
) -> Result<Vec<String>, sqlx::Error> {
    let mut removed = Vec::new();
    for article_id in db.home_article_ids().await? {
        if !current_ids.contains(&article_id) {
            db.set_status(&article_id, ArticleStatus::Removed).await?;
            info!(target: TARGET_DB, "Removed {}", article_id);
            removed.push(article_id);
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::notify::DryRunPost;
    use chrono::Utc;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        db: Database,
        notifier: Notifier,
        renderer: DiffRenderer,
    }

    impl Harness {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("test.db");
            let db = Database::new(path.to_str().unwrap()).await.unwrap();
            Harness {
                _dir: dir,
                db,
                notifier: Notifier::dry_run(),
                renderer: DiffRenderer::Plain,
            }
        }

        fn reconciler(&self) -> Reconciler<'_> {
            Reconciler::new(&self.db, &self.notifier, &self.renderer, "elpais")
        }
    }

    fn snapshot(id: &str, url: &str, title: &str, abstract_text: &str, author: &str) -> ArticleSnapshot {
        ArticleSnapshot {
            article_id: id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            author: author.to_string(),
            fingerprint: fingerprint(&[
                ("article_id", id),
                ("url", url),
                ("title", title),
                ("abstract", abstract_text),
                ("author", author),
            ]),
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_sighting_stores_version_one_without_notifying() {
        let harness = Harness::new().await;
        let candidate = snapshot("A1", "u1", "T1", "", "");

        let outcome = harness.reconciler().reconcile(&candidate).await.unwrap();
        assert_eq!(outcome, Outcome::New);

        let record = harness.db.status("A1").await.unwrap().unwrap();
        assert_eq!(record.status, ArticleStatus::Home);
        assert_eq!(record.last_notification_id, None);

        let versions = harness.db.versions("A1").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, 1);
        assert_eq!(versions[0].snapshot.title, "T1");

        assert!(harness.notifier.transcript().is_empty());
    }

    #[tokio::test]
    async fn redelivery_of_the_same_candidate_is_unchanged() {
        let harness = Harness::new().await;
        let candidate = snapshot("A1", "u1", "T1", "", "");

        assert_eq!(
            harness.reconciler().reconcile(&candidate).await.unwrap(),
            Outcome::New
        );
        assert_eq!(
            harness.reconciler().reconcile(&candidate).await.unwrap(),
            Outcome::Unchanged
        );

        assert_eq!(harness.db.versions("A1").await.unwrap().len(), 1);
        assert!(harness.notifier.transcript().is_empty());
    }

    #[tokio::test]
    async fn title_change_appends_and_threads_notifications() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "", ""))
            .await
            .unwrap();
        let outcome = reconciler
            .reconcile(&snapshot("A1", "u1", "T2", "", ""))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Changed(1));

        let versions = harness.db.versions("A1").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].version, 2);
        assert_eq!(versions[1].snapshot.title, "T2");

        // No prior notification id: a root text post anchors the chain, then
        // the diff image replies to it.
        let transcript = harness.notifier.transcript();
        assert_eq!(
            transcript,
            vec![
                DryRunPost::Text {
                    text: "u1".to_string()
                },
                DryRunPost::Media {
                    text: "Title changed @elpais".to_string(),
                    in_reply_to: Some("dry-1".to_string()),
                },
            ]
        );

        let record = harness.db.status("A1").await.unwrap().unwrap();
        assert_eq!(record.last_notification_id, Some("dry-2".to_string()));
    }

    #[tokio::test]
    async fn later_changes_reply_to_the_previous_notification() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "", ""))
            .await
            .unwrap();
        reconciler
            .reconcile(&snapshot("A1", "u1", "T2", "", ""))
            .await
            .unwrap();
        reconciler
            .reconcile(&snapshot("A1", "u1", "T3", "", ""))
            .await
            .unwrap();

        let transcript = harness.notifier.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(
            transcript[2],
            DryRunPost::Media {
                text: "Title changed @elpais".to_string(),
                in_reply_to: Some("dry-2".to_string()),
            }
        );
        let record = harness.db.status("A1").await.unwrap().unwrap();
        assert_eq!(record.last_notification_id, Some("dry-3".to_string()));
    }

    #[tokio::test]
    async fn version_numbers_stay_contiguous() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        for title in ["T1", "T2", "T2", "T3", "T4"] {
            reconciler
                .reconcile(&snapshot("A1", "u1", title, "", ""))
                .await
                .unwrap();
        }

        let versions = harness.db.versions("A1").await.unwrap();
        let numbers: Vec<i64> = versions.iter().map(|stored| stored.version).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn multiple_field_changes_emit_one_event_each() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "abs", "Jane"))
            .await
            .unwrap();
        let outcome = reconciler
            .reconcile(&snapshot("A1", "u1", "T2", "abs", "John"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Changed(2));

        // One root post anchors the chain, then one media reply per field.
        let transcript = harness.notifier.transcript();
        assert_eq!(transcript.len(), 3);
        assert!(matches!(transcript[0], DryRunPost::Text { .. }));
        assert_eq!(
            transcript[1],
            DryRunPost::Media {
                text: "Title changed @elpais".to_string(),
                in_reply_to: Some("dry-1".to_string()),
            }
        );
        assert_eq!(
            transcript[2],
            DryRunPost::Media {
                text: "Author changed @elpais".to_string(),
                in_reply_to: Some("dry-2".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn sweep_removes_articles_absent_from_the_poll() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "", ""))
            .await
            .unwrap();
        reconciler
            .reconcile(&snapshot("B2", "u2", "T2", "", ""))
            .await
            .unwrap();

        let current: HashSet<String> = [String::from("A1")].into();
        let removed = sweep_removed(&harness.db, &current).await.unwrap();
        assert_eq!(removed, vec!["B2".to_string()]);

        let a1 = harness.db.status("A1").await.unwrap().unwrap();
        let b2 = harness.db.status("B2").await.unwrap().unwrap();
        assert_eq!(a1.status, ArticleStatus::Home);
        assert_eq!(b2.status, ArticleStatus::Removed);
    }

    #[tokio::test]
    async fn reappearance_with_new_fingerprint_revives() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "", ""))
            .await
            .unwrap();
        sweep_removed(&harness.db, &HashSet::new()).await.unwrap();

        let outcome = reconciler
            .reconcile(&snapshot("A1", "u1", "T2", "", ""))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Changed(1));

        let record = harness.db.status("A1").await.unwrap().unwrap();
        assert_eq!(record.status, ArticleStatus::Home);
        assert_eq!(harness.db.versions("A1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reappearance_with_identical_fingerprint_stays_removed() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();
        let candidate = snapshot("A1", "u1", "T1", "", "");

        reconciler.reconcile(&candidate).await.unwrap();
        sweep_removed(&harness.db, &HashSet::new()).await.unwrap();

        let outcome = reconciler.reconcile(&candidate).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);

        let record = harness.db.status("A1").await.unwrap().unwrap();
        assert_eq!(record.status, ArticleStatus::Removed);
        assert_eq!(harness.db.versions("A1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notification_failure_keeps_the_version_row() {
        let harness = Harness::new().await;
        let reconciler = harness.reconciler();

        // The author appears out of nothing: the diff has an empty old side,
        // so rendering fails and the notification is skipped.
        reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "", ""))
            .await
            .unwrap();
        let outcome = reconciler
            .reconcile(&snapshot("A1", "u1", "T1", "", "Jane"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Changed(1));

        assert_eq!(harness.db.versions("A1").await.unwrap().len(), 2);
        assert!(harness.notifier.transcript().is_empty());
        let record = harness.db.status("A1").await.unwrap().unwrap();
        assert_eq!(record.last_notification_id, None);
    }

    #[tokio::test]
    async fn empty_candidate_is_rejected() {
        let harness = Harness::new().await;
        let mut candidate = snapshot("A1", "u1", "T1", "", "");
        candidate.article_id = String::new();

        assert!(harness.reconciler().reconcile(&candidate).await.is_err());
    }

    #[test]
    fn change_events_cover_exactly_the_differing_fields() {
        let old = snapshot("A1", "u1", "T1", "abs one", "Jane");
        let new = snapshot("A1", "u2", "T1", "abs two", "Jane");

        let events = change_events(&old, &new);
        let fields: Vec<ChangedField> = events.iter().map(|event| event.field).collect();
        assert_eq!(fields, vec![ChangedField::Url, ChangedField::Abstract]);
        assert_eq!(events[0].old_value, "u1");
        assert_eq!(events[0].new_value, "u2");
        assert_eq!(events[0].canonical_url, "u2");
    }
}
