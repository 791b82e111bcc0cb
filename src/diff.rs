//! Visual diff rendering for change notifications.
//!
//! A change-event's old and new values are turned into an HTML fragment with
//! word-level `<del>`/`<ins>` markers, then rendered to image bytes either by
//! an external HTML-to-image service or, for dry runs, returned as-is.

use reqwest::Client;
use serde_json::json;
use similar::{ChangeTag, TextDiff};
use thiserror::Error;
use tracing::debug;

use crate::TARGET_WEB_REQUEST;

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <style>
      body { font: 18px/1.6 Georgia, serif; background: #fff; margin: 24px; max-width: 640px; }
      del { background: #ffe3e3; color: #931515; }
      ins { background: #dcf5dc; color: #1c6b1c; text-decoration: none; }
    </style>
  </head>
  <body>
  <p>{diff}</p>
  </body>
</html>
"#;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render a diff with an empty side")]
    EmptyInput,
    #[error("render service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("render service returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Build the word-level diff of two texts as an HTML fragment.
///
/// Deleted runs are wrapped in `<del>`, inserted runs in `<ins>`, unchanged
/// runs kept verbatim. All values are HTML-escaped.
pub fn diff_markup(old: &str, new: &str) -> String {
    let diff = TextDiff::from_words(old, new);
    let mut markup = String::new();
    for change in diff.iter_all_changes() {
        let escaped = escape_html(change.value());
        match change.tag() {
            ChangeTag::Delete => {
                markup.push_str("<del>");
                markup.push_str(&escaped);
                markup.push_str("</del>");
            }
            ChangeTag::Insert => {
                markup.push_str("<ins>");
                markup.push_str(&escaped);
                markup.push_str("</ins>");
            }
            ChangeTag::Equal => markup.push_str(&escaped),
        }
    }
    markup
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Renders a change-event diff to image bytes.
#[derive(Debug, Clone)]
pub enum DiffRenderer {
    Http(HttpRenderer),
    Plain,
}

/// Client for an HTML-to-image render service.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
    render_url: String,
}

impl DiffRenderer {
    pub fn http(render_url: &str) -> Self {
        DiffRenderer::Http(HttpRenderer {
            client: Client::new(),
            render_url: render_url.to_string(),
        })
    }

    /// Render the diff between two field values to image bytes.
    ///
    /// Fails with [`RenderError::EmptyInput`] when either side is empty.
    pub async fn render_diff(&self, old: &str, new: &str) -> Result<Vec<u8>, RenderError> {
        if old.is_empty() || new.is_empty() {
            return Err(RenderError::EmptyInput);
        }
        let markup = diff_markup(old, new);
        match self {
            DiffRenderer::Http(renderer) => renderer.render(&markup).await,
            DiffRenderer::Plain => Ok(markup.into_bytes()),
        }
    }
}

impl HttpRenderer {
    async fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        let page = PAGE_TEMPLATE.replace("{diff}", markup);
        debug!(target: TARGET_WEB_REQUEST, "Rendering diff via {}", self.render_url);
        let response = self
            .client
            .post(&self.render_url)
            .json(&json!({ "html": page }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RenderError::Status(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
