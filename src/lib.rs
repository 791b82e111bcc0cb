pub mod article;
pub mod config;
pub mod db;
pub mod diff;
pub mod environment;
pub mod error;
pub mod feed;
pub mod fingerprint;
pub mod logging;
pub mod notify;
pub mod poll;
pub mod reconcile;
pub mod sanitize;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
