//! Memo Implementation
//!
//! A Memo caches a source function's return value inside an internal
//! computation, so that computations reading through the memo rerun only
//! when the value actually changes, not merely because something upstream
//! fired a notification.
//!
//! # How Memos Work
//!
//! 1. Construction starts an internal computation that evaluates the source
//!    with tracking enabled, establishing the memo's dependency footprint.
//!
//! 2. When an upstream dependency invalidates the internal computation and
//!    the runtime flushes, the source is re-evaluated. If the result equals
//!    the stored value, nothing happens. If it differs, the stored value is
//!    replaced and the memo's own dependents go through the value-diff walk
//!    of [`ValueDependency::changed`].
//!
//! 3. `get()` never waits for a flush: it evaluates the source directly, so
//!    the returned value always reflects the current state of the inputs.
//!
//! # Lifecycle
//!
//! `stop()` ends the internal computation and freezes the stored value.
//! `recompute()` stops and immediately restarts it, which is the way to
//! pick up a structurally different dependency footprint (for example when
//! the source consults inputs that did not exist yet at construction time).
//! A stopped memo restarts itself lazily on the next `get()`.

use std::sync::{Arc, RwLock};

use super::computation::Computation;
use super::runtime::Runtime;
use super::value_dependency::{Source, ValueDependency};

/// A self-recomputing cached value with change-only notification.
///
/// Cloning yields a handle to the same memo.
pub struct Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    runtime: Runtime,

    /// The wrapped value function, shared with `dep` and the internal
    /// computation's body.
    source: Source<T>,

    /// Dependency through which consumers read; notifies them only when
    /// this memo saw an actual change.
    dep: ValueDependency<T>,

    /// Most recent result of the internal computation (`None` before the
    /// first evaluation completes).
    last: Arc<RwLock<Option<T>>>,

    /// The internal computation currently driving recomputation.
    comp: Arc<RwLock<Computation>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a memo over the given source function and compute it
    /// immediately.
    pub fn new<F>(runtime: &Runtime, source: F) -> Self
    where
        F: Fn(Option<&Computation>) -> T + Send + Sync + 'static,
    {
        let source: Source<T> = Arc::new(source);
        let dep = ValueDependency::from_source(runtime, Arc::clone(&source));
        let last = Arc::new(RwLock::new(None));
        let comp = Self::start(runtime, &source, &dep, &last);
        Self {
            runtime: runtime.clone(),
            source,
            dep,
            last,
            comp: Arc::new(RwLock::new(comp)),
        }
    }

    /// Spin up the internal computation. Its body evaluates the source with
    /// tracking enabled and pushes a value-diff notification on change.
    fn start(
        runtime: &Runtime,
        source: &Source<T>,
        dep: &ValueDependency<T>,
        last: &Arc<RwLock<Option<T>>>,
    ) -> Computation {
        let source = Arc::clone(source);
        let dep = dep.clone();
        let last = Arc::clone(last);
        runtime.autorun(move |cx| {
            let new_value = source(Some(cx));
            let changed = {
                let mut guard = last.write().expect("last value lock poisoned");
                if guard.as_ref() != Some(&new_value) {
                    *guard = Some(new_value);
                    true
                } else {
                    false
                }
            };
            // Notify outside the lock; the diff walk runs invalidation hooks.
            if changed {
                dep.changed();
            }
        })
    }

    /// Get the current value.
    ///
    /// The source is evaluated on the spot, so the result is never stale
    /// even if invalidations are still waiting for a flush. If the internal
    /// computation has been stopped it is restarted (and recomputed) first.
    /// Passing a computation registers it as a dependent that reruns only
    /// on actual value changes.
    pub fn get(&self, ctx: Option<&Computation>) -> T {
        let stopped = self
            .comp
            .read()
            .expect("computation lock poisoned")
            .is_stopped();
        if stopped {
            self.restart();
        }
        self.dep.get(ctx)
    }

    /// Stop the internal computation. The stored value freezes and upstream
    /// changes no longer propagate. Idempotent.
    pub fn stop(&self) {
        let comp = self
            .comp
            .read()
            .expect("computation lock poisoned")
            .clone();
        comp.stop();
    }

    /// Stop and immediately restart the internal computation.
    ///
    /// The restarted run establishes a fresh dependency footprint, which is
    /// needed when the source's reactive inputs changed structurally in a
    /// way the memo cannot observe on its own.
    pub fn recompute(&self) {
        self.stop();
        self.restart();
    }

    fn restart(&self) {
        let comp = Self::start(&self.runtime, &self.source, &self.dep, &self.last);
        *self.comp.write().expect("computation lock poisoned") = comp;
    }

    /// Whether the internal computation is currently stopped.
    pub fn is_stopped(&self) -> bool {
        self.comp
            .read()
            .expect("computation lock poisoned")
            .is_stopped()
    }

    /// Number of computations currently reading through this memo.
    pub fn dependent_count(&self) -> usize {
        self.dep.dependent_count()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            source: Arc::clone(&self.source),
            dep: self.dep.clone(),
            last: Arc::clone(&self.last),
            comp: Arc::clone(&self.comp),
        }
    }
}

impl<T> std::fmt::Debug for Memo<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("stopped", &self.is_stopped())
            .field("dependent_count", &self.dependent_count())
            .field(
                "has_value",
                &self
                    .last
                    .read()
                    .expect("last value lock poisoned")
                    .is_some(),
            )
            .finish()
    }
}
