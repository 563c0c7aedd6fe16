use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::errors::SearchResult;

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    generation: u64,
    stopped: bool,
}

#[derive(Debug, Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Single-shot timer that can be rearmed, backed by one parked thread.
///
/// Every [`arm`](DelayTimer::arm) returns a new generation number and the
/// expiry callback receives the generation that fired, which lets the owner
/// tell a current firing from one it has already replaced. Rearming while armed
/// discards the pending firing and restarts the countdown.
///
/// The callback runs on the timer thread with no timer lock held, so it may
/// call back into `arm`/`disarm`.
pub struct DelayTimer {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DelayTimer {
    pub fn new<F>(on_expiry: F) -> SearchResult<Self>
    where
        F: Fn(u64) + Send + 'static,
    {
        let shared = Arc::new(TimerShared::default());
        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("keyscout-timer".to_string())
            .spawn(move || run_timer(&worker, on_expiry))?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Starts (or restarts) the countdown and returns its generation
    pub fn arm(&self, delay: Duration) -> u64 {
        let mut state = self.shared.state.lock();
        state.generation = state.generation.wrapping_add(1);
        if !state.stopped {
            state.deadline = Some(Instant::now() + delay);
            self.shared.wakeup.notify_one();
        }
        trace!("Timer armed: generation {} in {:?}", state.generation, delay);
        state.generation
    }

    /// Cancels a pending firing, if any
    pub fn disarm(&self) {
        let mut state = self.shared.state.lock();
        if state.deadline.take().is_some() {
            trace!("Timer disarmed: generation {}", state.generation);
            self.shared.wakeup.notify_one();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Stops the timer thread. No callback runs after this returns, unless it
    /// is called from inside the callback itself.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            state.deadline = None;
            self.shared.wakeup.notify_one();
        }

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for DelayTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer<F>(shared: &TimerShared, on_expiry: F)
where
    F: Fn(u64),
{
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            return;
        }

        let deadline = state.deadline;
        match deadline {
            None => {
                shared.wakeup.wait(&mut state);
            }
            Some(at) if Instant::now() >= at => {
                state.deadline = None;
                let generation = state.generation;
                trace!("Timer fired: generation {}", generation);
                MutexGuard::unlocked(&mut state, || on_expiry(generation));
            }
            Some(at) => {
                shared.wakeup.wait_until(&mut state, at);
            }
        }
    }
}
