/// Request and outcome types passed between the coordinator, its workers and
/// the observer.
///
/// A [`PendingRequest`] is the only piece of caller input the coordinator
/// keeps: every notification overwrites it and each execution copies it once,
/// when it starts. The copy is what the execution commits to, even if newer
/// input arrives while the executor is running.
use std::time::Duration;

/// The most recently requested search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRequest {
    /// Text the user has typed so far
    pub query: String,
    /// Upper bound the executor is asked to respect
    pub max_results: usize,
}

impl PendingRequest {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
        }
    }
}

/// Returns true when a result set of `len` entries was capped by `max_results`
/// and further matches may exist beyond it.
pub fn more_available(len: usize, max_results: usize) -> bool {
    len >= max_results
}

/// Everything one completed execution produced
#[derive(Debug, Clone)]
pub struct SearchOutcome<T> {
    /// The query the execution ran with
    pub query: String,
    /// The limit the execution ran with
    pub max_results: usize,
    /// Entries returned by the executor
    pub results: Vec<T>,
    /// Whether the result set hit the limit
    pub more_available: bool,
    /// Wall-clock time spent inside the executor
    pub elapsed: Duration,
}

impl<T> SearchOutcome<T> {
    pub fn new(request: PendingRequest, results: Vec<T>, elapsed: Duration) -> Self {
        let more_available = more_available(results.len(), request.max_results);
        Self {
            query: request.query,
            max_results: request.max_results,
            results,
            more_available,
            elapsed,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
