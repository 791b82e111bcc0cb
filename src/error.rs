use thiserror::Error;

/// Per-feed failures during one poll pass.
///
/// `FeedUnavailable` skips the feed for this run. `EntryParse` and `Database`
/// abort the remaining entries of the feed's current poll and skip its
/// liveness sweep.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("feed unavailable: {0}")]
    FeedUnavailable(String),
    #[error("entry parse failure: {0}")]
    EntryParse(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
