//! Value-Diffing Dependency
//!
//! A `ValueDependency` binds a dependency to a value-producing function and
//! invalidates a dependent only when the value that dependent last observed
//! actually differs from a freshly computed one. A plain
//! [`Dependency`](super::Dependency) reruns every dependent on every
//! notification, which wastes work in layered setups:
//!
//! ```rust,ignore
//! let inner = Dependency::new(&rt);
//! let vdep = ValueDependency::new(&rt, move |_| 1);
//!
//! let c = rt.autorun(move |cx| {
//!     inner.depend(Some(cx));
//!     let value = vdep.get(Some(cx));
//!     // ...
//! });
//!
//! // The value is still 1, but a plain dependency would rerun c anyway.
//! vdep.changed();
//! ```
//!
//! # How It Works
//!
//! `get()` evaluates the source untracked (the source receives `None`, so
//! nothing it reads can register dependencies), records the result on the
//! calling computation keyed by this dependency's id, and registers the
//! computation as a dependent. `changed()` evaluates the source once more
//! and walks the dependents, invalidating only those whose recorded value
//! compares unequal to the new one.

use std::sync::Arc;

use tracing::trace;

use super::computation::Computation;
use super::dependency::{Dependency, DependencyId};
use super::runtime::Runtime;

/// Shared handle to a value-producing function.
///
/// The function receives the computation to track reads against, or `None`
/// for an untracked evaluation.
pub type Source<T> = Arc<dyn Fn(Option<&Computation>) -> T + Send + Sync>;

/// A dependency that notifies dependents only on an actual value change.
///
/// `T` needs `PartialEq` to decide whether a dependent's recorded value
/// differs from a freshly computed one. Between `changed()` calls the type
/// is stateless apart from its id and dependent set: observed values live
/// on the dependent computations themselves.
///
/// Cloning yields a handle to the same dependency.
pub struct ValueDependency<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    dep: Dependency,
    source: Source<T>,
}

impl<T> ValueDependency<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a value-diffing dependency over the given source function.
    pub fn new<F>(runtime: &Runtime, source: F) -> Self
    where
        F: Fn(Option<&Computation>) -> T + Send + Sync + 'static,
    {
        Self::from_source(runtime, Arc::new(source))
    }

    pub(crate) fn from_source(runtime: &Runtime, source: Source<T>) -> Self {
        Self {
            dep: Dependency::new(runtime),
            source,
        }
    }

    /// Get the dependency's unique id.
    pub fn id(&self) -> DependencyId {
        self.dep.id()
    }

    /// Evaluate the source and return the value.
    ///
    /// The evaluation itself is untracked: the source receives `None`, so
    /// reads inside it register nothing. When a computation is passed, the
    /// value is recorded on it (keyed by this dependency's id) and the
    /// computation is registered as a dependent, which lets a later
    /// [`changed`](Self::changed) decide whether that computation must
    /// rerun. With `None` this is a plain read with no side effects.
    pub fn get(&self, ctx: Option<&Computation>) -> T {
        let value = (self.source)(None);
        if let Some(computation) = ctx {
            computation.record_observed(self.dep.id(), value.clone());
            self.dep.depend(Some(computation));
        }
        value
    }

    /// Re-evaluate the source once and invalidate only the dependents whose
    /// recorded value differs from the new one.
    ///
    /// Every dependent is compared against the same evaluation. Dependents
    /// whose value is unchanged are left untouched. A registered dependent
    /// that never called [`get`](Self::get) is a bug in the caller and
    /// panics here.
    pub fn changed(&self) {
        let new_value = (self.source)(None);
        let mut invalidated = 0usize;
        for computation in self.dep.dependents_snapshot() {
            let seen: T = computation
                .observed_value(self.dep.id())
                .expect("dependent computation has no recorded value for this dependency");
            if seen != new_value {
                computation.invalidate();
                invalidated += 1;
            }
        }
        trace!(
            dependency = self.dep.id().raw(),
            invalidated,
            "value-diff notification"
        );
    }

    /// Number of currently registered dependents.
    pub fn dependent_count(&self) -> usize {
        self.dep.dependent_count()
    }
}

impl<T> Clone for ValueDependency<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            dep: self.dep.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<T> std::fmt::Debug for ValueDependency<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueDependency")
            .field("id", &self.dep.id())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}
