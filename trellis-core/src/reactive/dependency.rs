//! Dependency Implementation
//!
//! A Dependency is the base trackable unit. It holds the set of computations
//! that read through it and can invalidate all of them at once.
//!
//! # How Dependencies Work
//!
//! 1. A computation registers itself by being passed into `depend()`.
//!    There is no implicit "current computation": tracking-aware calls take
//!    the requesting computation explicitly, and passing `None` reads
//!    without tracking.
//!
//! 2. Registration installs a one-shot hook on the computation that removes
//!    it from the dependent set when it is invalidated or stopped. A rerun
//!    that still reads the dependency simply re-registers.
//!
//! 3. `changed()` invalidates every dependent unconditionally. The
//!    value-diffing variant that invalidates selectively is
//!    [`ValueDependency`](super::ValueDependency), which composes this type.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::trace;

use super::computation::{Computation, ComputationId};
use super::runtime::Runtime;

/// Unique identifier for a dependency, allocated by its [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyId(u64);

impl DependencyId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A trackable unit holding a set of dependent computations.
///
/// `Dependency` is a cheap cloneable handle; clones share the same state.
/// The dependent set preserves registration order, so invalidations happen
/// in a deterministic order.
pub struct Dependency {
    inner: Arc<DependencyInner>,
}

struct DependencyInner {
    id: DependencyId,
    dependents: RwLock<IndexMap<ComputationId, Computation>>,
}

impl Dependency {
    /// Create a new dependency with no dependents.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Arc::new(DependencyInner {
                id: runtime.next_dependency_id(),
                dependents: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Get the dependency's unique id.
    pub fn id(&self) -> DependencyId {
        self.inner.id
    }

    /// Register the given computation as a dependent.
    ///
    /// Returns `true` if the computation was newly registered. With `None`
    /// (a read outside any computation) this is a no-op returning `false`.
    ///
    /// The dependent is removed again when it is invalidated or stopped;
    /// a rerun that reads this dependency re-registers it.
    pub fn depend(&self, ctx: Option<&Computation>) -> bool {
        let Some(computation) = ctx else {
            return false;
        };

        {
            let mut dependents = self
                .inner
                .dependents
                .write()
                .expect("dependents lock poisoned");
            if dependents.contains_key(&computation.id()) {
                return false;
            }
            dependents.insert(computation.id(), computation.clone());
        }
        trace!(
            dependency = self.inner.id.raw(),
            computation = computation.id().raw(),
            "dependent registered"
        );

        let weak = Arc::downgrade(&self.inner);
        let id = computation.id();
        computation.on_invalidate(move || {
            if let Some(dep) = weak.upgrade() {
                dep.dependents
                    .write()
                    .expect("dependents lock poisoned")
                    .shift_remove(&id);
            }
        });
        true
    }

    /// Invalidate every dependent computation unconditionally.
    pub fn changed(&self) {
        let dependents = self.dependents_snapshot();
        trace!(
            dependency = self.inner.id.raw(),
            count = dependents.len(),
            "invalidating all dependents"
        );
        for computation in dependents {
            computation.invalidate();
        }
    }

    /// Whether any computation is currently registered.
    pub fn has_dependents(&self) -> bool {
        self.dependent_count() > 0
    }

    /// Number of currently registered dependents.
    pub fn dependent_count(&self) -> usize {
        self.inner
            .dependents
            .read()
            .expect("dependents lock poisoned")
            .len()
    }

    /// Snapshot of the dependent set, taken before any invalidation so the
    /// removal hooks never run while the set lock is held.
    pub(crate) fn dependents_snapshot(&self) -> Vec<Computation> {
        self.inner
            .dependents
            .read()
            .expect("dependents lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl Clone for Dependency {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.inner.id)
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}
