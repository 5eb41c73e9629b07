//! Reactive Runtime
//!
//! The runtime is the central coordinator for the reactive system. It owns
//! the id counter that dependencies and computations are allocated from,
//! and the queue of invalidated computations awaiting a rerun.
//!
//! # How It Works
//!
//! 1. Dependencies and computations request an id from the runtime at
//!    construction. A single monotonic counter backs both; ids are never
//!    reset or reused.
//!
//! 2. When a computation is invalidated, it enqueues itself on the runtime.
//!
//! 3. `flush()` synchronously drains the queue, rerunning each computation
//!    that is still invalidated and not stopped. Computations invalidated
//!    *during* the drain are rerun in the same flush.
//!
//! # Ordering
//!
//! The queue is keyed by computation id, so each drain pass reruns
//! computations in creation order and duplicate invalidations collapse
//! into a single rerun.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tracing::{debug, trace};

use super::computation::{Computation, ComputationId};
use super::dependency::DependencyId;

/// Error returned by [`Runtime::flush`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FlushError {
    /// `flush()` was called from inside a computation that is itself being
    /// rerun by a flush.
    #[error("flush called while a flush is already in progress")]
    Reentrant,
}

/// The reactive runtime: id allocation plus the pending-rerun queue.
///
/// `Runtime` is a cheap cloneable handle; clones share the same state.
/// All evaluation is synchronous and happens on the calling thread.
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    /// Single monotonic counter behind every dependency and computation id.
    next_id: AtomicU64,

    /// Invalidated computations awaiting a rerun, keyed by id so that
    /// draining proceeds in creation order and duplicates collapse.
    pending: Mutex<BTreeMap<ComputationId, Computation>>,

    /// Set while `flush()` is draining; guards against re-entrant flushes.
    flushing: AtomicBool,
}

impl Runtime {
    /// Create a new, empty runtime.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                next_id: AtomicU64::new(0),
                pending: Mutex::new(BTreeMap::new()),
                flushing: AtomicBool::new(false),
            }),
        }
    }

    /// Create a computation that runs `body` immediately and again on every
    /// invalidation-driven rerun, until stopped.
    ///
    /// The body receives a reference to its own computation; passing that
    /// reference into tracking-aware reads (for example
    /// [`ValueDependency::get`](super::ValueDependency::get)) is what
    /// registers dependencies.
    pub fn autorun<F>(&self, body: F) -> Computation
    where
        F: Fn(&Computation) + Send + Sync + 'static,
    {
        let computation = Computation::new(self, body);
        computation.run();
        computation
    }

    /// Synchronously rerun every pending invalidated computation.
    ///
    /// Computations that become invalidated while the queue is draining are
    /// rerun before `flush()` returns. Stopped computations are skipped.
    pub fn flush(&self) -> Result<(), FlushError> {
        if self.inner.flushing.swap(true, Ordering::SeqCst) {
            return Err(FlushError::Reentrant);
        }
        // Cleared on drop, so a panicking rerun does not leave the runtime
        // stuck mid-flush.
        let _guard = FlushGuard {
            flushing: &self.inner.flushing,
        };

        let mut reran = 0usize;
        loop {
            // Take the whole batch so reruns never hold the queue lock.
            let batch = {
                let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
                std::mem::take(&mut *pending)
            };
            if batch.is_empty() {
                break;
            }

            for (_, computation) in batch {
                if computation.is_invalidated() && !computation.is_stopped() {
                    computation.run();
                    reran += 1;
                }
            }
        }

        debug!(reran, "flush drained");
        Ok(())
    }

    /// Number of computations currently awaiting a rerun.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().expect("pending lock poisoned").len()
    }

    pub(crate) fn enqueue(&self, computation: Computation) {
        trace!(computation = computation.id().raw(), "queued for rerun");
        self.inner
            .pending
            .lock()
            .expect("pending lock poisoned")
            .insert(computation.id(), computation);
    }

    pub(crate) fn next_dependency_id(&self) -> DependencyId {
        DependencyId::new(self.alloc_id())
    }

    pub(crate) fn next_computation_id(&self) -> ComputationId {
        ComputationId::new(self.alloc_id())
    }

    fn alloc_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Runtime {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

/// Clears the flushing flag when the drain ends, panicked or not.
struct FlushGuard<'a> {
    flushing: &'a AtomicBool,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.flushing.store(false, Ordering::SeqCst);
    }
}

/// Weak handle held by computations so that enqueueing never extends the
/// runtime's lifetime.
pub(crate) struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}
