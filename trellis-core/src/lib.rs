//! Trellis Core
//!
//! This crate provides a compact reactive dependency-tracking runtime with
//! value-diffing change propagation. It implements:
//!
//! - Computations with an invalidate/rerun lifecycle and a synchronous
//!   flush scheduler
//! - Explicit-context dependency tracking (no thread-local magic)
//! - Value-diffing dependencies that invalidate dependents only when a
//!   value actually changed
//! - Self-recomputing memos whose readers rerun on real changes only
//!
//! # Architecture
//!
//! Everything lives in the [`reactive`] module. The runtime pieces
//! ([`reactive::Runtime`], [`reactive::Computation`],
//! [`reactive::Dependency`]) provide dependency bookkeeping and the flush
//! cycle; [`reactive::ValueDependency`] and [`reactive::Memo`] are the
//! memoizing layer built on top of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::{Memo, Runtime, Dependency};
//!
//! let rt = Runtime::new();
//! let input = Dependency::new(&rt);
//!
//! // A memo that rereads some state guarded by `input`.
//! let input_clone = input.clone();
//! let memo = Memo::new(&rt, move |cx| {
//!     input_clone.depend(cx);
//!     expensive_read()
//! });
//!
//! // Readers rerun only when `expensive_read()` really changed.
//! let memo_clone = memo.clone();
//! rt.autorun(move |cx| {
//!     println!("value: {}", memo_clone.get(Some(cx)));
//! });
//!
//! input.changed();
//! rt.flush().unwrap();
//! ```

pub mod reactive;
