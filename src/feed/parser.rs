//! Normalization of raw feed entries into fingerprinted snapshots.

use chrono::Utc;

use super::types::FeedEntry;
use crate::article::ArticleSnapshot;
use crate::error::PollError;
use crate::fingerprint::fingerprint;
use crate::sanitize::strip_markup;

/// Normalize one feed entry into a fingerprinted snapshot.
///
/// The article identity is the first whitespace-delimited token of the
/// entry's id; an entry without a usable id is a parse failure.
pub fn snapshot_from_entry(entry: &FeedEntry) -> Result<ArticleSnapshot, PollError> {
    let article_id = entry
        .id
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    if article_id.is_empty() {
        return Err(PollError::EntryParse(format!(
            "entry {:?} has no usable id",
            entry.link
        )));
    }

    let abstract_text = entry
        .description
        .as_deref()
        .map(strip_markup)
        .unwrap_or_default();
    let author = entry.author.clone().unwrap_or_default();

    let fingerprint = fingerprint(&[
        ("article_id", article_id.as_str()),
        ("url", entry.link.as_str()),
        ("title", entry.title.as_str()),
        ("abstract", abstract_text.as_str()),
        ("author", author.as_str()),
    ]);

    Ok(ArticleSnapshot {
        article_id,
        url: entry.link.clone(),
        title: entry.title.clone(),
        abstract_text,
        author,
        fingerprint,
        captured_at: Utc::now(),
    })
}
