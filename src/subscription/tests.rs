use assert_call::{call, CallRecorder};

use super::*;

#[test]
fn from_fn_runs_on_drop() {
    let mut cr = CallRecorder::new();
    {
        let _s = Subscription::from_fn(|| call!("drop"));
    }
    cr.verify("drop");
}

#[test]
fn from_fn_runs_exactly_once() {
    let mut cr = CallRecorder::new();
    let s = Subscription::from_fn(|| call!("drop"));
    drop(s);
    cr.verify("drop");
}

#[test]
fn empty_is_silent() {
    let mut cr = CallRecorder::new();
    {
        let _s = Subscription::empty();
        let _d = Subscription::default();
    }
    cr.verify(());
}
