use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

/// Owning handle for one execution's cancellation flag.
///
/// The coordinator creates exactly one token per started execution and keeps
/// the live one in its current-operation slot. Cancelling is one-way.
#[derive(Debug)]
pub struct OperationToken {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl OperationToken {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Identifier of the execution this token belongs to
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Read-only view handed to the executor
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

/// Read-only view of an [`OperationToken`], polled by executors.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    /// A signal that is never cancelled, for calling executors directly
    pub fn never() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns [`SearchError::Cancelled`] once the owning token is cancelled
    pub fn check(&self) -> SearchResult<()> {
        if self.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
