/// Error types for keyscout.
///
/// Cancellation is modelled as an error variant only so that executors can
/// bail out of a superseded search with `?`:
/// ```rust,ignore
/// for (i, entry) in corpus.iter().enumerate() {
///     signal.check()?;
///     // ...
/// }
/// ```
/// The coordinator never reports [`SearchError::Cancelled`] to an observer. A
/// cancelled execution is discarded, not failed.
use thiserror::Error;

/// Result type for coordinator and executor operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while coordinating or executing searches
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search was cancelled")]
    Cancelled,
    #[error("Search executor failed: {0}")]
    Executor(String),
    #[error("Search coordinator has been shut down")]
    ShutDown,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl SearchError {
    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Returns true for the variant used to abandon a superseded execution
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
