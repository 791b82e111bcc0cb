//! HTTP fetching of configured feeds.

use feed_rs::parser;
use reqwest::Client;
use std::io::Cursor;
use tracing::debug;

use super::types::{FeedEntry, REQUEST_TIMEOUT, USER_AGENT};
use crate::error::PollError;
use crate::TARGET_WEB_REQUEST;

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch and parse one feed; a single attempt, no retries within a run.
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, PollError> {
        debug!(target: TARGET_WEB_REQUEST, "Loading feed from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| PollError::FeedUnavailable(format!("request failed: {}", err)))?;

        if !response.status().is_success() {
            return Err(PollError::FeedUnavailable(format!(
                "non-success status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| PollError::FeedUnavailable(format!("failed to read body: {}", err)))?;

        let feed = parser::parse(Cursor::new(&bytes[..]))
            .map_err(|err| PollError::FeedUnavailable(format!("failed to parse feed: {}", err)))?;

        if feed.entries.is_empty() {
            return Err(PollError::FeedUnavailable("feed has no entries".to_string()));
        }

        debug!(target: TARGET_WEB_REQUEST, "Parsed feed with {} entries", feed.entries.len());
        Ok(feed.entries.into_iter().map(entry_from_feed).collect())
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_from_feed(entry: feed_rs::model::Entry) -> FeedEntry {
    FeedEntry {
        id: entry.id,
        link: entry
            .links
            .first()
            .map(|link| link.href.clone())
            .unwrap_or_default(),
        title: entry.title.map(|title| title.content).unwrap_or_default(),
        description: entry.summary.map(|summary| summary.content),
        author: entry.authors.first().map(|author| author.name.clone()),
    }
}
