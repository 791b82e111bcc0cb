//! Change notification posting.
//!
//! Posts are threaded: the first notification for an article starts with a
//! root text post carrying the article URL, and every diff image is posted
//! as a reply to the most recent post in that article's chain.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::TARGET_WEB_REQUEST;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("post request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notifier returned status {0}: {1}")]
    Status(reqwest::StatusCode, String),
    #[error("notifier response carried no id")]
    MissingId,
}

/// Posting client, selected at construction time.
#[derive(Debug)]
pub enum Notifier {
    Mastodon(MastodonClient),
    DryRun(DryRunNotifier),
}

impl Notifier {
    pub fn mastodon(base_url: &str, access_token: &str) -> Self {
        Notifier::Mastodon(MastodonClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn dry_run() -> Self {
        Notifier::DryRun(DryRunNotifier::default())
    }

    /// Post a plain text status, returning its notification id.
    pub async fn post_text(&self, text: &str) -> Result<String, NotifyError> {
        match self {
            Notifier::Mastodon(client) => client.post_status(text, Vec::new(), None).await,
            Notifier::DryRun(dry) => {
                info!(target: TARGET_WEB_REQUEST, "Dry run, would post text: {}", text);
                Ok(dry.record(DryRunPost::Text {
                    text: text.to_string(),
                }))
            }
        }
    }

    /// Post a status with an attached image, optionally as a reply.
    pub async fn post_media(
        &self,
        text: &str,
        image: &[u8],
        in_reply_to: Option<&str>,
    ) -> Result<String, NotifyError> {
        match self {
            Notifier::Mastodon(client) => {
                let media_id = client.upload_media(image).await?;
                client.post_status(text, vec![media_id], in_reply_to).await
            }
            Notifier::DryRun(dry) => {
                info!(
                    target: TARGET_WEB_REQUEST,
                    "Dry run, would post media ({} bytes): {} (reply to {:?})",
                    image.len(),
                    text,
                    in_reply_to
                );
                Ok(dry.record(DryRunPost::Media {
                    text: text.to_string(),
                    in_reply_to: in_reply_to.map(|id| id.to_string()),
                }))
            }
        }
    }

    /// The would-be posts captured so far; always empty for live notifiers.
    pub fn transcript(&self) -> Vec<DryRunPost> {
        match self {
            Notifier::DryRun(dry) => dry.posts.lock().unwrap().clone(),
            Notifier::Mastodon(_) => Vec::new(),
        }
    }
}

/// Client for a Mastodon-compatible status API.
#[derive(Debug)]
pub struct MastodonClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl MastodonClient {
    async fn upload_media(&self, image: &[u8]) -> Result<String, NotifyError> {
        let part = Part::bytes(image.to_vec())
            .file_name("diff.png")
            .mime_str("image/png")?;
        let form = Form::new().part("file", part);

        debug!(target: TARGET_WEB_REQUEST, "Uploading {} bytes of media", image.len());
        let response = self
            .client
            .post(format!("{}/api/v2/media", self.base_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        extract_id(response).await
    }

    async fn post_status(
        &self,
        text: &str,
        media_ids: Vec<String>,
        in_reply_to: Option<&str>,
    ) -> Result<String, NotifyError> {
        let mut payload = json!({
            "status": text,
            "media_ids": media_ids,
        });
        if let Some(reply_id) = in_reply_to {
            payload["in_reply_to_id"] = json!(reply_id);
        }

        debug!(target: TARGET_WEB_REQUEST, "Posting status (reply to {:?})", in_reply_to);
        let response = self
            .client
            .post(format!("{}/api/v1/statuses", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        extract_id(response).await
    }
}

async fn extract_id(response: reqwest::Response) -> Result<String, NotifyError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(NotifyError::Status(status, body));
    }
    let value: serde_json::Value = response.json().await?;
    value
        .get("id")
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
        .ok_or(NotifyError::MissingId)
}

/// Logs would-be posts instead of sending them, and keeps a transcript.
#[derive(Debug, Default)]
pub struct DryRunNotifier {
    posts: Mutex<Vec<DryRunPost>>,
    next_id: AtomicU64,
}

impl DryRunNotifier {
    fn record(&self, post: DryRunPost) -> String {
        self.posts.lock().unwrap().push(post);
        format!("dry-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// One would-be post captured by the dry-run notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DryRunPost {
    Text {
        text: String,
    },
    Media {
        text: String,
        in_reply_to: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_ids_are_distinct_and_recorded() {
        let notifier = Notifier::dry_run();
        let root = notifier.post_text("https://example.com/a").await.unwrap();
        let reply = notifier
            .post_media("Title changed", b"image", Some(&root))
            .await
            .unwrap();
        assert_ne!(root, reply);

        let transcript = notifier.transcript();
        assert_eq!(
            transcript,
            vec![
                DryRunPost::Text {
                    text: "https://example.com/a".to_string()
                },
                DryRunPost::Media {
                    text: "Title changed".to_string(),
                    in_reply_to: Some(root)
                },
            ]
        );
    }
}
