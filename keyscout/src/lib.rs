pub mod config;
pub mod errors;
pub mod metrics;
pub mod results;
pub mod search;

pub use config::CoordinatorConfig;
pub use errors::{SearchError, SearchResult};
pub use metrics::{CoordinatorMetrics, CoordinatorStats};
pub use results::{PendingRequest, SearchOutcome};
pub use search::{
    CancellationSignal, Executor, SearchCoordinator, SearchExecutor, SearchObserver, SearchPhase,
    DEBOUNCE_DELAY,
};
