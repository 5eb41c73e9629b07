//! Integration Tests for the Value-Diffing Layer
//!
//! These tests verify that the runtime, dependencies, value-diffing
//! dependencies, and memos work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use trellis_core::reactive::{Dependency, Memo, Runtime, ValueDependency};

/// A notification with an unchanged value must not rerun the dependent;
/// a notification after a real change must rerun it exactly once.
#[test]
fn value_dependency_reruns_only_on_real_change() {
    let rt = Runtime::new();
    let value = Arc::new(AtomicI32::new(1));
    let runs = Arc::new(AtomicI32::new(0));
    let observed = Arc::new(AtomicI32::new(0));

    let value_clone = value.clone();
    let dep = ValueDependency::new(&rt, move |_| value_clone.load(Ordering::SeqCst));

    let dep_clone = dep.clone();
    let runs_clone = runs.clone();
    let observed_clone = observed.clone();
    let _c = rt.autorun(move |cx| {
        observed_clone.store(dep_clone.get(Some(cx)), Ordering::SeqCst);
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    dep.changed();
    rt.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1, "value did not change");

    value.store(2, Ordering::SeqCst);
    dep.changed();
    rt.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2, "value changed");
    assert_eq!(observed.load(Ordering::SeqCst), 2);
}

/// A memo shields its readers from upstream notifications that do not
/// change the computed value, even though the inner dependency itself
/// invalidates unconditionally.
#[test]
fn memo_shields_readers_from_no_op_notifications() {
    let rt = Runtime::new();
    let inner = Dependency::new(&rt);
    let value = Arc::new(AtomicI32::new(1));
    let outer_runs = Arc::new(AtomicI32::new(0));
    let observed = Arc::new(AtomicI32::new(0));

    let inner_clone = inner.clone();
    let value_clone = value.clone();
    let memo = Memo::new(&rt, move |cx| {
        inner_clone.depend(cx);
        value_clone.load(Ordering::SeqCst)
    });

    let memo_clone = memo.clone();
    let outer_runs_clone = outer_runs.clone();
    let observed_clone = observed.clone();
    let _outer = rt.autorun(move |cx| {
        observed_clone.store(memo_clone.get(Some(cx)), Ordering::SeqCst);
        outer_runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    // The inner dependency fires, the memo recomputes, the value is the
    // same: the outer computation must stay untouched.
    inner.changed();
    rt.flush().unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    // A real change propagates through the memo exactly once.
    value.store(2, Ordering::SeqCst);
    inner.changed();
    rt.flush().unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
    assert_eq!(observed.load(Ordering::SeqCst), 2);
}

/// Two dependents with different snapshots of the same value dependency:
/// one notification may rerun one and leave the other alone.
#[test]
fn dependents_with_diverging_snapshots_are_diffed_independently() {
    let rt = Runtime::new();
    let value = Arc::new(AtomicI32::new(1));
    let runs_stale = Arc::new(AtomicI32::new(0));
    let runs_fresh = Arc::new(AtomicI32::new(0));

    let value_clone = value.clone();
    let dep = ValueDependency::new(&rt, move |_| value_clone.load(Ordering::SeqCst));

    let dep_stale = dep.clone();
    let runs_stale_clone = runs_stale.clone();
    let _stale = rt.autorun(move |cx| {
        dep_stale.get(Some(cx));
        runs_stale_clone.fetch_add(1, Ordering::SeqCst);
    });

    value.store(2, Ordering::SeqCst);

    let dep_fresh = dep.clone();
    let runs_fresh_clone = runs_fresh.clone();
    let _fresh = rt.autorun(move |cx| {
        dep_fresh.get(Some(cx));
        runs_fresh_clone.fetch_add(1, Ordering::SeqCst);
    });

    dep.changed();
    rt.flush().unwrap();

    assert_eq!(runs_stale.load(Ordering::SeqCst), 2, "snapshot was 1, value is 2");
    assert_eq!(runs_fresh.load(Ordering::SeqCst), 1, "snapshot was already 2");
}

/// A memo read is always fresh: no dependency notification, no flush, and
/// the reader still sees the current state of the inputs.
#[test]
fn memo_get_does_not_wait_for_a_flush() {
    let rt = Runtime::new();
    let value = Arc::new(AtomicI32::new(10));

    let value_clone = value.clone();
    let memo = Memo::new(&rt, move |_| value_clone.load(Ordering::SeqCst));
    assert_eq!(memo.get(None), 10);

    value.store(11, Ordering::SeqCst);
    assert_eq!(memo.get(None), 11);
    assert_eq!(rt.pending_count(), 0);
}

/// Stopping a memo detaches it from upstream changes; reading it again
/// restarts the internal computation with a fresh footprint.
#[test]
fn stopped_memo_restarts_on_read() {
    let rt = Runtime::new();
    let inner = Dependency::new(&rt);
    let value = Arc::new(AtomicI32::new(1));
    let outer_runs = Arc::new(AtomicI32::new(0));

    let inner_clone = inner.clone();
    let value_clone = value.clone();
    let memo = Memo::new(&rt, move |cx| {
        inner_clone.depend(cx);
        value_clone.load(Ordering::SeqCst)
    });

    let memo_clone = memo.clone();
    let outer_runs_clone = outer_runs.clone();
    let _outer = rt.autorun(move |cx| {
        memo_clone.get(Some(cx));
        outer_runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    memo.stop();
    assert_eq!(inner.dependent_count(), 0);

    // While stopped, upstream changes go nowhere.
    value.store(2, Ordering::SeqCst);
    inner.changed();
    rt.flush().unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);

    // A direct read restarts the memo and sees the current value.
    assert_eq!(memo.get(None), 2);
    assert!(!memo.is_stopped());
    assert_eq!(inner.dependent_count(), 1);

    // And changes propagate again.
    value.store(3, Ordering::SeqCst);
    inner.changed();
    rt.flush().unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
}

/// Memos can be chained; a no-op change at the bottom never reaches the
/// top, and a real change walks the whole chain exactly once.
#[test]
fn chained_memos_propagate_real_changes_only() {
    let rt = Runtime::new();
    let inner = Dependency::new(&rt);
    let value = Arc::new(AtomicI32::new(1));
    let outer_runs = Arc::new(AtomicI32::new(0));
    let observed = Arc::new(AtomicI32::new(0));

    let inner_clone = inner.clone();
    let value_clone = value.clone();
    let base = Memo::new(&rt, move |cx| {
        inner_clone.depend(cx);
        value_clone.load(Ordering::SeqCst)
    });

    let base_clone = base.clone();
    let doubled = Memo::new(&rt, move |cx| base_clone.get(cx) * 2);

    let doubled_clone = doubled.clone();
    let outer_runs_clone = outer_runs.clone();
    let observed_clone = observed.clone();
    let _outer = rt.autorun(move |cx| {
        observed_clone.store(doubled_clone.get(Some(cx)), Ordering::SeqCst);
        outer_runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(observed.load(Ordering::SeqCst), 2);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);

    inner.changed();
    rt.flush().unwrap();
    assert_eq!(outer_runs.load(Ordering::SeqCst), 1);

    value.store(5, Ordering::SeqCst);
    inner.changed();
    rt.flush().unwrap();
    assert_eq!(observed.load(Ordering::SeqCst), 10);
    assert_eq!(outer_runs.load(Ordering::SeqCst), 2);
}

/// Several value dependencies read by one computation keep their snapshots
/// apart: a change in one does not confuse the diff of the other.
#[test]
fn one_computation_tracks_many_value_dependencies() {
    let rt = Runtime::new();
    let a = Arc::new(AtomicI32::new(1));
    let b = Arc::new(AtomicI32::new(100));
    let runs = Arc::new(AtomicI32::new(0));

    let a_clone = a.clone();
    let dep_a = ValueDependency::new(&rt, move |_| a_clone.load(Ordering::SeqCst));
    let b_clone = b.clone();
    let dep_b = ValueDependency::new(&rt, move |_| b_clone.load(Ordering::SeqCst));

    let dep_a_clone = dep_a.clone();
    let dep_b_clone = dep_b.clone();
    let runs_clone = runs.clone();
    let _c = rt.autorun(move |cx| {
        dep_a_clone.get(Some(cx));
        dep_b_clone.get(Some(cx));
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Neither value moved: both notifications are no-ops.
    dep_a.changed();
    dep_b.changed();
    rt.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Only b moved: exactly one rerun, and the rerun re-registers both.
    b.store(101, Ordering::SeqCst);
    dep_b.changed();
    rt.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(dep_a.dependent_count(), 1);
    assert_eq!(dep_b.dependent_count(), 1);
}

/// `recompute()` rebuilds the dependency footprint so sources that grow new
/// inputs over time can pick them up.
#[test]
fn recompute_picks_up_new_inputs() {
    let rt = Runtime::new();
    let ready_flags = Arc::new(std::sync::Mutex::new(vec![false]));
    let deps: Vec<Dependency> = (0..3).map(|_| Dependency::new(&rt)).collect();
    let all_ready_runs = Arc::new(AtomicI32::new(0));

    let flags_clone = ready_flags.clone();
    let deps_clone = deps.clone();
    let memo = Memo::new(&rt, move |cx| {
        let flags = flags_clone.lock().unwrap();
        // Track one dependency per known flag; flags added later are
        // invisible until a recompute.
        for dep in deps_clone.iter().take(flags.len()) {
            dep.depend(cx);
        }
        flags.iter().all(|ready| *ready)
    });

    let memo_clone = memo.clone();
    let all_ready_clone = all_ready_runs.clone();
    let _outer = rt.autorun(move |cx| {
        if memo_clone.get(Some(cx)) {
            all_ready_clone.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(all_ready_runs.load(Ordering::SeqCst), 0);
    assert_eq!(deps[0].dependent_count(), 1);
    assert_eq!(deps[1].dependent_count(), 0);

    // Two more flags appear after construction.
    ready_flags.lock().unwrap().extend([false, false]);
    memo.recompute();
    assert_eq!(deps[1].dependent_count(), 1);
    assert_eq!(deps[2].dependent_count(), 1);

    // Flip everything to ready; the last notification flips the memo value
    // and the outer computation fires once.
    for (i, dep) in deps.iter().enumerate() {
        ready_flags.lock().unwrap()[i] = true;
        dep.changed();
        rt.flush().unwrap();
    }
    assert_eq!(all_ready_runs.load(Ordering::SeqCst), 1);
}
