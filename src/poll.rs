//! The poll driver: one sequential pass over every configured feed.

use std::collections::HashSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{Config, FeedConfig};
use crate::db::Database;
use crate::diff::DiffRenderer;
use crate::error::PollError;
use crate::feed::{snapshot_from_entry, FeedEntry, FeedFetcher};
use crate::notify::Notifier;
use crate::reconcile::{sweep_removed, Reconciler};
use crate::{TARGET_DB, TARGET_WEB_REQUEST};

/// Everything one poll pass needs, constructed once per run.
pub struct PollContext {
    pub config: Config,
    pub db: Database,
    pub notifier: Notifier,
    pub renderer: DiffRenderer,
}

/// Poll every configured feed once, reconciling each against stored history.
pub async fn poll_feeds(ctx: &PollContext) {
    let fetcher = FeedFetcher::new();

    for feed in &ctx.config.feeds {
        if feed.url.trim().is_empty() {
            debug!(target: TARGET_WEB_REQUEST, "Skipping feed {} with empty URL", feed.name);
            continue;
        }
        if Url::parse(&feed.url).is_err() {
            warn!(target: TARGET_WEB_REQUEST, "Skipping feed {} with invalid URL: {}", feed.name, feed.url);
            continue;
        }

        info!(target: TARGET_WEB_REQUEST, "Polling {}", feed.name);
        match fetcher.fetch(&feed.url).await {
            Ok(entries) => reconcile_poll(ctx, feed, entries).await,
            Err(err) => {
                warn!(target: TARGET_WEB_REQUEST, "Skipping {}: {}", feed.name, err);
            }
        }
    }
}

/// Poll on a fixed interval instead of exiting after one pass.
pub async fn poll_loop(ctx: &PollContext) {
    let interval = Duration::from_secs(ctx.config.poll_interval_secs);
    loop {
        poll_feeds(ctx).await;
        debug!(target: TARGET_WEB_REQUEST, "Sleeping {:?} before next poll", interval);
        sleep(interval).await;
    }
}

/// Reconcile one feed's entries, then sweep, but only when the whole entry
/// loop succeeded.
async fn reconcile_poll(ctx: &PollContext, feed: &FeedConfig, entries: Vec<FeedEntry>) {
    match reconcile_entries(ctx, feed, entries).await {
        Ok(current_ids) => match sweep_removed(&ctx.db, &current_ids).await {
            Ok(removed) => {
                if !removed.is_empty() {
                    info!(target: TARGET_DB, "{}: {} article(s) left the feed", feed.name, removed.len());
                }
            }
            Err(err) => {
                error!(target: TARGET_DB, "Sweep failed for {}: {}", feed.name, err);
            }
        },
        Err(err) => {
            error!(target: TARGET_WEB_REQUEST, "Aborted {} poll, sweep skipped: {}", feed.name, err);
        }
    }
}

async fn reconcile_entries(
    ctx: &PollContext,
    feed: &FeedConfig,
    entries: Vec<FeedEntry>,
) -> Result<HashSet<String>, PollError> {
    let reconciler = Reconciler::new(&ctx.db, &ctx.notifier, &ctx.renderer, &feed.handle);
    let mut current_ids = HashSet::new();

    for entry in entries {
        let candidate = snapshot_from_entry(&entry)?;
        let outcome = reconciler.reconcile(&candidate).await?;
        debug!(target: TARGET_DB, "{}: {} -> {:?}", feed.name, candidate.article_id, outcome);
        current_ids.insert(candidate.article_id);
    }

    Ok(current_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleStatus;
    use tempfile::TempDir;

    fn feed_config() -> FeedConfig {
        FeedConfig {
            name: "Test Feed".to_string(),
            url: "https://example.com/rss".to_string(),
            handle: String::new(),
        }
    }

    fn entry(id: &str, title: &str) -> FeedEntry {
        FeedEntry {
            id: id.to_string(),
            link: format!("https://example.com/{}", id),
            title: title.to_string(),
            description: None,
            author: None,
        }
    }

    async fn context(dir: &TempDir) -> PollContext {
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        PollContext {
            config: Config {
                db_path: path.to_string_lossy().to_string(),
                render_url: None,
                mastodon_base_url: None,
                mastodon_access_token: None,
                poll_interval_secs: 600,
                feeds: Vec::new(),
            },
            db,
            notifier: Notifier::dry_run(),
            renderer: DiffRenderer::Plain,
        }
    }

    #[tokio::test]
    async fn successful_poll_sweeps_absent_articles() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let feed = feed_config();

        reconcile_poll(&ctx, &feed, vec![entry("A1", "T1"), entry("Z9", "T9")]).await;
        reconcile_poll(&ctx, &feed, vec![entry("A1", "T1")]).await;

        let a1 = ctx.db.status("A1").await.unwrap().unwrap();
        let z9 = ctx.db.status("Z9").await.unwrap().unwrap();
        assert_eq!(a1.status, ArticleStatus::Home);
        assert_eq!(z9.status, ArticleStatus::Removed);
    }

    #[tokio::test]
    async fn entry_failure_aborts_the_feed_and_skips_the_sweep() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let feed = feed_config();

        reconcile_poll(&ctx, &feed, vec![entry("Z9", "T9")]).await;

        // Z9 is absent from this poll, but the malformed entry aborts it
        // before the sweep; B2 comes after the failure and is never seen.
        let bad = entry("  ", "No id");
        reconcile_poll(&ctx, &feed, vec![entry("A1", "T1"), bad, entry("B2", "T2")]).await;

        let z9 = ctx.db.status("Z9").await.unwrap().unwrap();
        assert_eq!(z9.status, ArticleStatus::Home);
        assert!(ctx.db.status("A1").await.unwrap().is_some());
        assert!(ctx.db.status("B2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_entries_in_one_poll_reconcile_once() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir).await;
        let feed = feed_config();

        reconcile_poll(
            &ctx,
            &feed,
            vec![entry("A1", "T1"), entry("A1", "T1")],
        )
        .await;

        assert_eq!(ctx.db.versions("A1").await.unwrap().len(), 1);
    }
}
