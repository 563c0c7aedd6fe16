use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::executor::{Executor, SearchExecutor};
use super::observer::SearchObserver;
use super::timer::DelayTimer;
use super::token::{CancellationSignal, OperationToken};
use crate::config::CoordinatorConfig;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::CoordinatorMetrics;
use crate::results::{PendingRequest, SearchOutcome};

/// How long input has to stay quiet before a notified search starts
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

/// What the coordinator is doing for the newest request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// No timer armed, nothing current running
    Idle,
    /// Waiting for the debounce delay to elapse
    Pending,
    /// The current execution is queued on or running in the worker pool
    Running,
}

/// Everything caller threads and workers agree on, behind one lock.
///
/// The request, the timer generation and the current-token slot move together,
/// so a worker's snapshot and its token claim are a single step.
#[derive(Debug, Default)]
struct CoordinatorState {
    pending: PendingRequest,
    /// Timer generation whose firing should start an execution
    armed: Option<u64>,
    /// Ticket of a dispatched execution whose worker has not started yet
    queued: Option<u64>,
    /// Token of the execution whose results are eligible for delivery
    current: Option<OperationToken>,
    /// Executions handed to the pool that have not finished yet
    pool_jobs: usize,
    next_ticket: u64,
    shut_down: bool,
}

impl CoordinatorState {
    fn cancel_current(&mut self) {
        if let Some(token) = self.current.take() {
            debug!("Cancelling search {}", token.id());
            token.cancel();
        }
    }

    fn phase(&self) -> SearchPhase {
        if self.armed.is_some() {
            SearchPhase::Pending
        } else if self.queued.is_some() || self.current.is_some() {
            SearchPhase::Running
        } else {
            SearchPhase::Idle
        }
    }
}

struct Shared<T> {
    state: Mutex<CoordinatorState>,
    idle: Condvar,
    /// Held while callbacks run; shutdown takes it to wait out a delivery
    delivery: ReentrantMutex<()>,
    executor: Executor<T>,
    observer: Arc<dyn SearchObserver<T>>,
    pool: rayon::ThreadPool,
    pool_size: usize,
    metrics: CoordinatorMetrics,
}

/// Debounces search-as-you-type input and makes sure only the newest search
/// ever reaches the observer.
///
/// # Flow
///
/// ```text
/// notify_input ──► [300 ms timer] ──► worker pool ──► executor ──► observer
/// trigger_immediate ─────────────────┘
/// ```
///
/// * [`notify_input`](Self::notify_input) records the request, cancels the
///   running search and (re)arms the debounce timer.
/// * [`trigger_immediate`](Self::trigger_immediate) resets everything and
///   dispatches right away.
/// * Executions run on a worker pool. When every pooled worker is busy,
///   usually with superseded searches that ignore cancellation, the new
///   execution gets a dedicated thread instead of queueing behind them.
/// * Each execution claims the current-operation slot when it starts,
///   cancelling whatever held it. Results of an execution whose token was
///   cancelled are dropped, whatever the executor returned.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = SearchCoordinator::new(
///     Executor::from_fn(|query, max, signal| index.lookup(query, max, signal)),
///     ResultsPane::new(),
///     &CoordinatorConfig::default(),
/// )?;
///
/// coordinator.notify_input("ab", 50)?;
/// coordinator.notify_input("abc", 50)?; // only "abc" runs, 300 ms from now
/// ```
pub struct SearchCoordinator<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    timer: DelayTimer,
}

impl<T: Send + 'static> SearchCoordinator<T> {
    pub fn new<O>(
        executor: Executor<T>,
        observer: O,
        config: &CoordinatorConfig,
    ) -> SearchResult<Self>
    where
        O: SearchObserver<T> + 'static,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count.get())
            .thread_name(|index| format!("keyscout-worker-{}", index))
            .panic_handler(|payload| {
                warn!("Search worker panicked: {}", panic_message(&*payload));
            })
            .build()?;

        let observer: Arc<dyn SearchObserver<T>> = Arc::new(observer);
        let shared = Arc::new(Shared {
            state: Mutex::new(CoordinatorState::default()),
            idle: Condvar::new(),
            delivery: ReentrantMutex::new(()),
            executor,
            observer,
            pool,
            pool_size: config.thread_count.get(),
            metrics: CoordinatorMetrics::new(),
        });

        let weak: Weak<Shared<T>> = Arc::downgrade(&shared);
        let timer = DelayTimer::new(move |generation| {
            if let Some(shared) = weak.upgrade() {
                shared.on_timer(generation);
            }
        })?;

        debug!(
            "Search coordinator ready: {} worker threads, executor {:?}",
            config.thread_count, shared.executor
        );

        Ok(Self { shared, timer })
    }

    /// Records new input and restarts the debounce countdown.
    ///
    /// Cancels the running search, if any. Without an executor this only
    /// records the request and clears pending work.
    pub fn notify_input(&self, query: impl Into<String>, max_results: usize) -> SearchResult<()> {
        let mut state = self.shared.state.lock();
        if state.shut_down {
            return Err(SearchError::ShutDown);
        }
        self.shared.metrics.record_notification();
        state.pending = PendingRequest::new(query, max_results);

        if !self.shared.executor.is_configured() {
            self.reset_locked(&mut state);
            drop(state);
            self.shared.idle.notify_all();
            return Ok(());
        }

        state.cancel_current();
        state.queued = None;
        state.armed = Some(self.timer.arm(DEBOUNCE_DELAY));
        trace!("Input recorded: {:?}", state.pending);
        Ok(())
    }

    /// Resets, records the request and dispatches it without waiting
    pub fn trigger_immediate(
        &self,
        query: impl Into<String>,
        max_results: usize,
    ) -> SearchResult<()> {
        let mut state = self.shared.state.lock();
        if state.shut_down {
            return Err(SearchError::ShutDown);
        }
        self.shared.metrics.record_immediate_trigger();
        self.reset_locked(&mut state);
        state.pending = PendingRequest::new(query, max_results);

        if self.shared.executor.is_configured() {
            self.shared.dispatch(&mut state);
        }
        drop(state);
        self.shared.idle.notify_all();
        Ok(())
    }

    /// Cancels the current search and disarms the timer. Idempotent.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        self.shared.metrics.record_reset();
        self.reset_locked(&mut state);
        drop(state);
        self.shared.idle.notify_all();
    }

    /// Stops the timer and cancels the current search. After this returns no
    /// timer fires and no observer callback runs. Also runs on drop.
    pub fn shutdown(&self) {
        let first = {
            let mut state = self.shared.state.lock();
            let first = !state.shut_down;
            state.shut_down = true;
            self.reset_locked(&mut state);
            first
        };

        self.timer.shutdown();
        // Waits for a delivery that checked its token before the cancel above
        drop(self.shared.delivery.lock());
        self.shared.idle.notify_all();

        if first {
            debug!("Search coordinator shut down");
            self.shared.metrics.log_stats();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shut_down
    }

    pub fn phase(&self) -> SearchPhase {
        self.shared.state.lock().phase()
    }

    /// Blocks until the coordinator is idle or `timeout` elapses.
    /// Returns whether it became idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.phase() != SearchPhase::Idle {
            if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                return state.phase() == SearchPhase::Idle;
            }
        }
        true
    }

    /// The request the next execution would run with
    pub fn pending_request(&self) -> PendingRequest {
        self.shared.state.lock().pending.clone()
    }

    pub fn metrics(&self) -> &CoordinatorMetrics {
        &self.shared.metrics
    }

    fn reset_locked(&self, state: &mut CoordinatorState) {
        state.cancel_current();
        state.queued = None;
        state.armed = None;
        self.timer.disarm();
    }
}

impl<T: Send + 'static> Drop for SearchCoordinator<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Send + 'static> Shared<T> {
    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        if state.shut_down || state.armed != Some(generation) {
            trace!("Ignoring stale timer generation {}", generation);
            return;
        }
        state.armed = None;
        self.dispatch(&mut state);
    }

    /// Hands the pending request to the worker pool under a fresh ticket
    fn dispatch(self: &Arc<Self>, state: &mut CoordinatorState) {
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.queued = Some(ticket);
        state.cancel_current();
        self.metrics.record_dispatch();
        debug!("Dispatching search {} for {:?}", ticket, state.pending.query);

        if state.pool_jobs < self.pool_size || !self.spawn_overflow(ticket) {
            state.pool_jobs += 1;
            let shared = Arc::clone(self);
            self.pool.spawn(move || {
                let _slot = PoolSlot { shared: &*shared };
                shared.run_operation(ticket);
            });
        }
    }

    /// Runs an execution on its own thread. Returns false if the thread
    /// could not be started.
    fn spawn_overflow(self: &Arc<Self>, ticket: u64) -> bool {
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("keyscout-overflow-{}", ticket))
            .spawn(move || {
                let run = panic::catch_unwind(AssertUnwindSafe(|| shared.run_operation(ticket)));
                if let Err(payload) = run {
                    warn!("Search worker panicked: {}", panic_message(&*payload));
                }
            });

        match spawned {
            Ok(_) => {
                self.metrics.record_overflow();
                debug!("Worker pool busy, search {} runs on its own thread", ticket);
                true
            }
            Err(err) => {
                warn!("Failed to start thread for search {}: {}", ticket, err);
                false
            }
        }
    }

    fn run_operation(&self, ticket: u64) {
        let Executor::Configured(executor) = &self.executor else {
            return;
        };

        let (signal, request) = {
            let mut state = self.state.lock();
            if state.shut_down || state.queued != Some(ticket) {
                drop(state);
                self.metrics.record_superseded_before_start();
                debug!("Search {} superseded before it started", ticket);
                self.idle.notify_all();
                return;
            }
            state.queued = None;

            let token = OperationToken::new(ticket);
            let signal = token.signal();
            if let Some(previous) = state.current.replace(token) {
                previous.cancel();
            }
            (signal, state.pending.clone())
        };
        let _completion = Completion {
            shared: self,
            ticket,
        };

        self.metrics.record_start();
        debug!(
            "Search {} started: {:?} (max {})",
            ticket, request.query, request.max_results
        );

        let started = Instant::now();
        let result = run_executor(&**executor, &request, &signal);
        let elapsed = started.elapsed();

        self.deliver(ticket, &signal, request, result, elapsed);
    }

    fn deliver(
        &self,
        ticket: u64,
        signal: &CancellationSignal,
        request: PendingRequest,
        result: SearchResult<Vec<T>>,
        elapsed: Duration,
    ) {
        let _delivery = self.delivery.lock();
        if signal.is_cancelled() {
            self.metrics.record_discard();
            debug!("Search {} was superseded, discarding its outcome", ticket);
            return;
        }

        match result {
            Ok(results) => {
                let outcome = SearchOutcome::new(request, results, elapsed);
                debug!(
                    "Search {} complete: {} results for {:?} in {:?}",
                    ticket,
                    outcome.len(),
                    outcome.query,
                    outcome.elapsed
                );
                self.observer
                    .display_results(&outcome.results, outcome.more_available);
                self.observer
                    .search_complete(&outcome.query, &outcome.results, outcome.elapsed);
                self.metrics.record_delivery();
            }
            Err(SearchError::Cancelled) => {
                self.metrics.record_discard();
                debug!("Search {} returned cancelled, discarding", ticket);
            }
            Err(error) => {
                warn!("Search {} for {:?} failed: {}", ticket, request.query, error);
                self.observer.search_failed(&request.query, &error, elapsed);
                self.metrics.record_failure();
            }
        }
    }
}

/// Runs the executor, turning a panic into an executor error
fn run_executor<T: Send + 'static>(
    executor: &dyn SearchExecutor<Item = T>,
    request: &PendingRequest,
    signal: &CancellationSignal,
) -> SearchResult<Vec<T>> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        executor.execute(&request.query, request.max_results, signal)
    }))
    .unwrap_or_else(|payload| {
        Err(SearchError::executor(format!(
            "executor panicked: {}",
            panic_message(&*payload)
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Frees a pool worker's place in the count once its job ends
struct PoolSlot<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Drop for PoolSlot<'_, T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.pool_jobs = state.pool_jobs.saturating_sub(1);
    }
}

/// Releases the current-operation slot when an execution ends, however it ends
struct Completion<'a, T> {
    shared: &'a Shared<T>,
    ticket: u64,
}

impl<T> Drop for Completion<'_, T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if state
            .current
            .as_ref()
            .is_some_and(|token| token.id() == self.ticket)
        {
            state.current = None;
        }
        drop(state);
        self.shared.idle.notify_all();
    }
}
