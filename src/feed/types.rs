//! Type definitions for the feed module.

use tokio::time::Duration;

/// One entry pulled from a feed, before normalization.
#[derive(Debug, Clone, Default)]
pub struct FeedEntry {
    pub id: String,
    pub link: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
}

// Constants
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("newsdiff/", env!("CARGO_PKG_VERSION"));
