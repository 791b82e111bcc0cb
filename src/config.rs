use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One monitored feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,

    /// Social handle mentioned in change notifications; empty to omit.
    #[serde(default)]
    pub handle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// HTML-to-image render service endpoint; absent renders diffs as markup.
    pub render_url: Option<String>,

    pub mastodon_base_url: Option<String>,
    pub mastodon_access_token: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_db_path() -> String {
    "newsdiff.db".to_string()
}

fn default_poll_interval() -> u64 {
    600
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}
