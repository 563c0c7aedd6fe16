use std::fmt;
use std::sync::Arc;

use super::token::CancellationSignal;
use crate::errors::SearchResult;

/// Performs the actual lookup for a query.
///
/// Called synchronously on a worker thread. Implementations should poll
/// `signal` and return early once it is cancelled; the coordinator never
/// preempts them and discards whatever a cancelled call returns.
///
/// Closures with the same signature implement this trait:
/// ```rust,ignore
/// let executor = Executor::from_fn(|query, max, signal| {
///     signal.check()?;
///     Ok(index.lookup(query, max))
/// });
/// ```
pub trait SearchExecutor: Send + Sync {
    type Item: Send + 'static;

    fn execute(
        &self,
        query: &str,
        max_results: usize,
        signal: &CancellationSignal,
    ) -> SearchResult<Vec<Self::Item>>;
}

impl<F, T> SearchExecutor for F
where
    F: Fn(&str, usize, &CancellationSignal) -> SearchResult<Vec<T>> + Send + Sync,
    T: Send + 'static,
{
    type Item = T;

    fn execute(
        &self,
        query: &str,
        max_results: usize,
        signal: &CancellationSignal,
    ) -> SearchResult<Vec<T>> {
        self(query, max_results, signal)
    }
}

/// The search strategy a coordinator was built with.
///
/// `Unconfigured` is a real state: a coordinator holding it accepts input but
/// never starts an execution.
pub enum Executor<T> {
    Unconfigured,
    Configured(Arc<dyn SearchExecutor<Item = T>>),
}

impl<T: Send + 'static> Executor<T> {
    pub fn new<E>(executor: E) -> Self
    where
        E: SearchExecutor<Item = T> + 'static,
    {
        Self::Configured(Arc::new(executor))
    }

    /// Same as [`new`](Executor::new), but gives closures their signature up front
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, usize, &CancellationSignal) -> SearchResult<Vec<T>> + Send + Sync + 'static,
    {
        Self::Configured(Arc::new(f))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }
}

impl<T> Clone for Executor<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Unconfigured => Self::Unconfigured,
            Self::Configured(executor) => Self::Configured(Arc::clone(executor)),
        }
    }
}

impl<T> Default for Executor<T> {
    fn default() -> Self {
        Self::Unconfigured
    }
}

impl<T> fmt::Debug for Executor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => f.write_str("Executor::Unconfigured"),
            Self::Configured(_) => f.write_str("Executor::Configured(..)"),
        }
    }
}
