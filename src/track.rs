use std::{cell::RefCell, rc::Rc};

use crate::subscription::Subscription;

#[cfg(test)]
mod tests;

thread_local! {
    /// Stack of "currently evaluating" computations. The top frame decides
    /// what a reactive read reports to: `Some` collects dependencies, `None`
    /// suppresses capture entirely.
    static FRAMES: RefCell<Vec<Option<DepLog>>> = RefCell::new(Vec::new());
}

/// A reactive value seen through its dependency-tracking surface.
///
/// Everything a view can depend on implements this: a change subscription is
/// all that is needed to drive recomputation.
pub(crate) trait DepSource: 'static {
    fn subscribe_change(self: Rc<Self>, on_change: Box<dyn FnMut()>) -> Subscription;
}

/// Type-erased handle to a reactive value.
///
/// Obtained from `as_dep()` on [`Cell`](crate::Cell), [`View`](crate::View)
/// and [`Lens`](crate::Lens); used to declare an explicit dependency list
/// with [`View::with_deps`](crate::View::with_deps).
pub struct Dep(pub(crate) Rc<dyn DepSource>);

impl Clone for Dep {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Collects the distinct reactive values read during one capture frame.
#[derive(Clone)]
pub(crate) struct DepLog(Rc<RefCell<Vec<Rc<dyn DepSource>>>>);

impl DepLog {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }
    fn record(&self, source: &Rc<dyn DepSource>) {
        let mut reads = self.0.borrow_mut();
        if !reads.iter().any(|read| Rc::ptr_eq(read, source)) {
            reads.push(source.clone());
        }
    }
    pub fn into_deps(self) -> Vec<Dep> {
        self.0.borrow_mut().drain(..).map(Dep).collect()
    }
}

/// Runs `action` under a new capture frame, popping the frame even if
/// `action` panics. A stale frame would mis-attribute later unrelated reads
/// to a computation that already finished.
pub(crate) fn capture<R>(log: Option<DepLog>, action: impl FnOnce() -> R) -> R {
    struct Frame;
    impl Drop for Frame {
        fn drop(&mut self) {
            FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
    FRAMES.with(|frames| frames.borrow_mut().push(log));
    let _frame = Frame;
    action()
}

/// Called by every reactive read. Reports `source` to the innermost capture
/// frame, if there is one and it is not suppressing.
pub(crate) fn report(source: &Rc<dyn DepSource>) {
    let top = FRAMES.with(|frames| frames.borrow().last().cloned());
    if let Some(Some(log)) = top {
        log.record(source);
    }
}

/// Runs `f` with dependency capture suppressed.
///
/// Reads inside `f` are not recorded as dependencies of any enclosing
/// computation:
///
/// ```
/// use boxcell::{untracked, Cell, View};
///
/// let counted = Cell::new(1);
/// let ignored = Cell::new(10);
/// let v = {
///     let (counted, ignored) = (counted.clone(), ignored.clone());
///     View::new(move || counted.get() + untracked(|| ignored.get()))
/// };
/// let _s = v.subscribe(|_| {});
/// ignored.set(20);
/// assert_eq!(v.get(), 11); // not recomputed: `ignored` is not a dependency
/// counted.set(2);
/// assert_eq!(v.get(), 22); // recomputed, picking up both writes
/// ```
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    capture(None, f)
}
