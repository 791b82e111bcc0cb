//! Domain types shared by the store, the reconciler, and the poll driver.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use thiserror::Error;

/// One immutable capture of an article's tracked fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSnapshot {
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub abstract_text: String,
    pub author: String,
    pub fingerprint: String,
    pub captured_at: DateTime<Utc>,
}

impl ArticleSnapshot {
    pub fn field(&self, field: ChangedField) -> &str {
        match field {
            ChangedField::Url => &self.url,
            ChangedField::Title => &self.title,
            ChangedField::Abstract => &self.abstract_text,
            ChangedField::Author => &self.author,
        }
    }
}

/// A snapshot as stored in the version chain, with its version number.
#[derive(Debug, Clone)]
pub struct StoredVersion {
    pub version: i64,
    pub snapshot: ArticleSnapshot,
}

/// The fields compared between consecutive versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedField {
    Url,
    Title,
    Abstract,
    Author,
}

impl ChangedField {
    pub const ALL: [ChangedField; 4] = [
        ChangedField::Url,
        ChangedField::Title,
        ChangedField::Abstract,
        ChangedField::Author,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ChangedField::Url => "url",
            ChangedField::Title => "title",
            ChangedField::Abstract => "abstract",
            ChangedField::Author => "author",
        }
    }

    /// Capitalized form used in notification text.
    pub const fn label(&self) -> &'static str {
        match self {
            ChangedField::Url => "Url",
            ChangedField::Title => "Title",
            ChangedField::Abstract => "Abstract",
            ChangedField::Author => "Author",
        }
    }
}

/// Whether an article is currently on the feed or has dropped off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleStatus {
    Home,
    Removed,
}

impl ArticleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Home => "home",
            ArticleStatus::Removed => "removed",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown article status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for ArticleStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "home" => Ok(ArticleStatus::Home),
            "removed" => Ok(ArticleStatus::Removed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The mutable per-article row: one per article_id.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub article_id: String,
    pub status: ArticleStatus,
    pub first_seen: DateTime<Utc>,
    pub last_notification_id: Option<String>,
}

/// One detected field-level difference between consecutive versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub article_id: String,
    pub field: ChangedField,
    pub old_value: String,
    pub new_value: String,
    pub canonical_url: String,
}
