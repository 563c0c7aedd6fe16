/// Debounced search coordination.
///
/// # Components
///
/// 1. [`SearchCoordinator`] owns the state machine (idle, pending, running),
///    the debounce timer and a worker pool.
/// 2. [`DelayTimer`] is the single-shot, rearmable timer behind the debounce.
/// 3. [`OperationToken`] and [`CancellationSignal`] carry cancellation from
///    the coordinator to whichever execution it superseded.
/// 4. [`SearchExecutor`] and [`SearchObserver`] are the two seams callers
///    plug into: one performs the lookup, the other receives the results.
///
/// # Ordering
///
/// The newest request always wins. A newer notification cancels the running
/// execution cooperatively; the executor may keep going, but what it returns
/// is never delivered.
pub mod coordinator;
pub mod executor;
pub mod observer;
pub mod timer;
pub mod token;

pub use coordinator::{SearchCoordinator, SearchPhase, DEBOUNCE_DELAY};
pub use executor::{Executor, SearchExecutor};
pub use observer::{NoopObserver, SearchObserver};
pub use timer::DelayTimer;
pub use token::{CancellationSignal, OperationToken};
