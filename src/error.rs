use thiserror::Error;

/// Fatal conditions. Anything surfacing one of these exits non-zero before
/// persisted state is touched.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("watchlist not found at {0}; create it or point SCOUT_WATCHLIST at one")]
    MissingWatchlist(String),
    #[error("watchlist unreadable: {0}")]
    UnreadableWatchlist(String),
    #[error("watchlist invalid: {0}")]
    InvalidWatchlist(String),
    #[error("collector rejected credentials before any state change: {0}")]
    UpstreamAuth(String),
    #[error("another scout process holds the scheduler lock ({0})")]
    SchedulerBusy(String),
}
