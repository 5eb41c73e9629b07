//! Reactive Primitives
//!
//! This module implements a small dependency-tracking runtime and, on top
//! of it, the value-diffing layer that keeps dependent computations from
//! rerunning when nothing actually changed.
//!
//! # Concepts
//!
//! ## Computations
//!
//! A [`Computation`] is a re-runnable unit of work created by
//! [`Runtime::autorun`]. Invalidation marks it for a rerun; the runtime's
//! [`flush`](Runtime::flush) drains all pending reruns synchronously.
//!
//! ## Dependencies
//!
//! A [`Dependency`] holds the set of computations that read through it.
//! Its `changed()` invalidates every dependent. A [`ValueDependency`] binds
//! a dependency to a value function and invalidates a dependent only when
//! the value that dependent last saw differs from a freshly computed one.
//!
//! ## Memos
//!
//! A [`Memo`] wraps a value function in an internally managed computation.
//! Upstream notifications rerun the internal computation; the memo's own
//! dependents are notified only when the recomputed value really differs
//! from the previous one. `get()` evaluates the function directly, so it
//! never returns a value older than the current inputs.
//!
//! # Implementation Notes
//!
//! There is no implicit "current computation" context. Tracking-aware calls
//! take `Option<&Computation>` explicitly: [`Runtime::autorun`] hands the
//! body a reference to its own computation, and the body threads it into
//! the reads it wants tracked. Passing `None` is the untracked mode; value
//! functions are always evaluated with `None`, so reads inside them can
//! never register dependencies of their own.
//!
//! Ids for dependencies and computations come from a counter owned by the
//! [`Runtime`], so two runtimes never share hidden state.

mod computation;
mod dependency;
mod memo;
mod runtime;
mod value_dependency;

pub use computation::{Computation, ComputationId};
pub use dependency::{Dependency, DependencyId};
pub use memo::Memo;
pub use runtime::{FlushError, Runtime};
pub use value_dependency::{Source, ValueDependency};
