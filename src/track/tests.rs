use std::panic::{catch_unwind, AssertUnwindSafe};

use assert_call::{call, CallRecorder};

use super::{capture, DepLog, FRAMES};
use crate::{untracked, Cell, View};

#[test]
fn distinct_sources_are_recorded_once() {
    let a = Cell::new(1);
    let log = DepLog::new();
    capture(Some(log.clone()), || a.get() + a.get());
    assert_eq!(log.into_deps().len(), 1);
}

#[test]
fn inner_frames_do_not_leak_to_outer_frames() {
    let a = Cell::new(1);
    let outer = DepLog::new();
    capture(Some(outer.clone()), || {
        let inner = DepLog::new();
        capture(Some(inner.clone()), || a.get());
        assert_eq!(inner.into_deps().len(), 1);
    });
    assert_eq!(outer.into_deps().len(), 0);
}

#[test]
fn frame_is_popped_when_the_action_panics() {
    let result = catch_unwind(AssertUnwindSafe(|| {
        capture(Some(DepLog::new()), || -> i32 { panic!("compute failed") })
    }));
    assert!(result.is_err());
    FRAMES.with(|frames| assert!(frames.borrow().is_empty()));
}

#[test]
fn untracked_suppresses_capture_inside_computations() {
    let mut cr = CallRecorder::new();
    let tracked = Cell::new(1);
    let ignored = Cell::new(10);
    let v = {
        let (tracked, ignored) = (tracked.clone(), ignored.clone());
        View::new(move || {
            call!("compute");
            tracked.get() + untracked(|| ignored.get())
        })
    };
    let _s = v.subscribe(|_| {});
    cr.verify("compute");
    ignored.set(20);
    cr.verify(());
    tracked.set(2);
    cr.verify("compute");
    assert_eq!(v.get(), 22);
}

#[test]
fn reads_outside_any_frame_are_a_noop() {
    let a = Cell::new(1);
    assert_eq!(a.get(), 1);
    FRAMES.with(|frames| assert!(frames.borrow().is_empty()));
}
