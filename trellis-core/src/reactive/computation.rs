//! Computation Implementation
//!
//! A Computation is a re-runnable unit of reactive work. It is created by
//! [`Runtime::autorun`](super::Runtime::autorun), runs its body immediately,
//! and reruns whenever it is invalidated and the runtime flushes.
//!
//! # Lifecycle
//!
//! running -> (invalidate) -> pending rerun -> (flush) -> running -> ...
//! running -> (stop) -> stopped (terminal; reruns are skipped)
//!
//! Invalidation is idempotent: a computation that is already invalidated
//! stays invalidated and is rerun once per flush at most.
//!
//! # Observed values
//!
//! Each computation owns a mapping from dependency id to the value it last
//! observed through that dependency's tracked read. A single computation may
//! read many value-diffing dependencies, so the mapping lives on the
//! computation rather than on any one dependency, and its lifetime follows
//! the computation's. The mapping is cleared at the start of every rerun:
//! an entry exists exactly when the computation performed a tracked read of
//! that dependency since it last started running.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::trace;

use super::dependency::DependencyId;
use super::runtime::{Runtime, WeakRuntime};

/// Unique identifier for a computation, allocated by its [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputationId(u64);

impl ComputationId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A re-runnable unit of reactive work.
///
/// `Computation` is a cheap cloneable handle; clones share the same state.
pub struct Computation {
    inner: Arc<ComputationInner>,
}

struct ComputationInner {
    id: ComputationId,

    /// Weak so a parked computation never keeps its runtime alive.
    runtime: WeakRuntime,

    /// The body, rerun on every flush while invalidated.
    body: Box<dyn Fn(&Computation) + Send + Sync>,

    invalidated: AtomicBool,
    stopped: AtomicBool,

    /// One-shot hooks fired on the next invalidation (or stop).
    on_invalidate: Mutex<Vec<Box<dyn FnOnce() + Send>>>,

    /// Last value observed per dependency, type-erased. See module docs.
    observed: RwLock<HashMap<DependencyId, Box<dyn Any + Send + Sync>>>,
}

impl Computation {
    pub(crate) fn new<F>(runtime: &Runtime, body: F) -> Self
    where
        F: Fn(&Computation) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ComputationInner {
                id: runtime.next_computation_id(),
                runtime: runtime.downgrade(),
                body: Box::new(body),
                invalidated: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                on_invalidate: Mutex::new(Vec::new()),
                observed: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get the computation's unique id.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Whether the computation has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Whether the computation is awaiting a rerun.
    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.load(Ordering::SeqCst)
    }

    /// Mark the computation as needing a rerun on the next flush.
    ///
    /// Idempotent. Fires any registered one-shot hooks, then enqueues the
    /// computation on its runtime unless it has been stopped.
    pub fn invalidate(&self) {
        if self.inner.invalidated.swap(true, Ordering::SeqCst) {
            return;
        }
        trace!(computation = self.inner.id.raw(), "invalidated");

        let hooks: Vec<_> = {
            let mut guard = self.inner.on_invalidate.lock().expect("hook lock poisoned");
            guard.drain(..).collect()
        };
        for hook in hooks {
            hook();
        }

        if !self.is_stopped() {
            if let Some(runtime) = self.inner.runtime.upgrade() {
                runtime.enqueue(self.clone());
            }
        }
    }

    /// Stop the computation. It is invalidated one final time (firing any
    /// hooks) but never enqueued, so it will not run again. Idempotent.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        trace!(computation = self.inner.id.raw(), "stopped");
        self.invalidate();
    }

    /// Register a hook that fires once, on the next invalidation or stop.
    ///
    /// If the computation is already invalidated the hook fires immediately.
    pub fn on_invalidate<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_invalidated() {
            hook();
            return;
        }
        self.inner
            .on_invalidate
            .lock()
            .expect("hook lock poisoned")
            .push(Box::new(hook));
    }

    /// Run the body. Clears the observed-value map and the invalidated flag
    /// first, so the run starts from a fresh tracking footprint.
    pub(crate) fn run(&self) {
        if self.is_stopped() {
            return;
        }
        self.inner.invalidated.store(false, Ordering::SeqCst);
        self.inner
            .observed
            .write()
            .expect("observed lock poisoned")
            .clear();
        trace!(computation = self.inner.id.raw(), "running");
        (self.inner.body)(self);
    }

    /// Record the value this computation observed through a tracked read.
    pub(crate) fn record_observed<T>(&self, dependency: DependencyId, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner
            .observed
            .write()
            .expect("observed lock poisoned")
            .insert(dependency, Box::new(value));
    }

    /// Get the value last observed through the given dependency, if any.
    pub(crate) fn observed_value<T>(&self, dependency: DependencyId) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner
            .observed
            .read()
            .expect("observed lock poisoned")
            .get(&dependency)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }
}

impl Clone for Computation {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("invalidated", &self.is_invalidated())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
