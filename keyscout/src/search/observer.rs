use std::time::Duration;

use crate::errors::SearchError;

/// Receives the outcome of every execution that is still current when it
/// finishes. Methods run on a worker thread, one delivery at a time.
///
/// Calling [`SearchCoordinator::shutdown`](super::SearchCoordinator::shutdown)
/// from inside a callback is allowed; it takes effect for every later delivery.
pub trait SearchObserver<T>: Send + Sync {
    /// New results to show, and whether the limit cut them short
    fn display_results(&self, results: &[T], more_available: bool);

    /// Called right after [`display_results`](SearchObserver::display_results)
    fn search_complete(&self, query: &str, results: &[T], elapsed: Duration);

    /// The executor returned an error for a current execution.
    /// Neither of the other callbacks fires for it.
    fn search_failed(&self, _query: &str, _error: &SearchError, _elapsed: Duration) {}
}

/// Observer that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<T> SearchObserver<T> for NoopObserver {
    fn display_results(&self, _results: &[T], _more_available: bool) {}

    fn search_complete(&self, _query: &str, _results: &[T], _elapsed: Duration) {}
}

impl<T, O> SearchObserver<T> for std::sync::Arc<O>
where
    O: SearchObserver<T> + ?Sized,
{
    fn display_results(&self, results: &[T], more_available: bool) {
        (**self).display_results(results, more_available);
    }

    fn search_complete(&self, query: &str, results: &[T], elapsed: Duration) {
        (**self).search_complete(query, results, elapsed);
    }

    fn search_failed(&self, query: &str, error: &SearchError, elapsed: Duration) {
        (**self).search_failed(query, error, elapsed);
    }
}
