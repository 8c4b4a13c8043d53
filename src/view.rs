use std::{cell::RefCell, rc::Rc};

use derive_ex::derive_ex;

use crate::{
    registry::{self, Registry},
    subscription::Subscription,
    track::{self, Dep, DepLog, DepSource},
    value::Value,
};


/// A read-only reactive value computed from other reactive values.
///
/// A view lives in one of two modes, keyed on its own subscriber count:
///
/// - **Unobserved** (no subscribers): every [`get`](View::get) runs the
///   compute function and retains nothing. Always fresh, no cache, no
///   subscriptions held to anything.
/// - **Observed** (at least one subscriber): the value is cached and the view
///   subscribes to every reactive value the compute function read last time,
///   recomputing eagerly on each dependency change and notifying its own
///   subscribers when the result differs.
///
/// When the last subscriber is dropped the cache and every dependency
/// subscription are torn down, so an unobserved view holds no strong
/// references to its dependencies.
#[derive_ex(Clone, bound())]
pub struct View<T: Value>(Rc<ViewNode<T>>);

struct ViewNode<T: Value> {
    compute: Box<dyn Fn() -> T>,
    explicit_deps: Option<Vec<Dep>>,
    subs: RefCell<Registry<T>>,
    state: RefCell<ViewState<T>>,
}

struct ViewState<T> {
    cached: Option<T>,
    dep_subs: Vec<Subscription>,
}

impl<T: Value> View<T> {
    /// Creates a view whose dependencies are discovered automatically: every
    /// reactive value read during `compute` becomes a dependency of the view.
    ///
    /// ```
    /// use boxcell::{Cell, View};
    ///
    /// let a = Cell::new(2);
    /// let b = Cell::new(2);
    /// let sum = {
    ///     let (a, b) = (a.clone(), b.clone());
    ///     View::new(move || a.get() + b.get())
    /// };
    /// assert_eq!(sum.get(), 4);
    /// a.set(3);
    /// assert_eq!(sum.get(), 5);
    /// ```
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::build(Box::new(compute), None)
    }

    /// Creates a view with an explicit dependency list, used verbatim instead
    /// of the captured set. For compute functions where automatic capture
    /// would over- or under-subscribe.
    pub fn with_deps(
        compute: impl Fn() -> T + 'static,
        deps: impl IntoIterator<Item = Dep>,
    ) -> Self {
        Self::build(Box::new(compute), Some(deps.into_iter().collect()))
    }

    fn build(compute: Box<dyn Fn() -> T>, explicit_deps: Option<Vec<Dep>>) -> Self {
        Self(Rc::new(ViewNode {
            compute,
            explicit_deps,
            subs: RefCell::new(Registry::new()),
            state: RefCell::new(ViewState {
                cached: None,
                dep_subs: Vec::new(),
            }),
        }))
    }

    /// Returns the current value, reporting the read to the capture stack.
    ///
    /// With subscribers this is the cached value; without, the compute
    /// function runs on every call.
    pub fn get(&self) -> T {
        track::report(&(self.0.clone() as Rc<dyn DepSource>));
        if let Some(value) = self.0.state.borrow().cached.clone() {
            return value;
        }
        // Unobserved: recompute and discard. The throwaway frame keeps the
        // inner reads from leaking into an enclosing computation.
        let log = DepLog::new();
        track::capture(Some(log), || (self.0.compute)())
    }

    /// Monotonic revision counter, bumped once per observed change of the
    /// computed value.
    pub fn revision(&self) -> u64 {
        self.0.subs.borrow().revision()
    }

    /// Registers `f` to run whenever the computed value changes.
    ///
    /// The first subscriber switches the view to observed mode; dropping the
    /// last [`Subscription`] switches it back and releases the cache and all
    /// dependency subscriptions.
    pub fn subscribe(&self, f: impl FnMut(&T) + 'static) -> Subscription {
        self.0.subscribe_raw(Box::new(f), false)
    }

    /// Erased handle for [`View::with_deps`].
    pub fn as_dep(&self) -> Dep {
        Dep(self.0.clone())
    }
}

impl<T: Value> ViewNode<T> {
    /// One compute-and-subscribe cycle: re-resolve dependencies, recompute,
    /// and notify own subscribers if the result changed.
    fn refresh(self: &Rc<Self>) {
        self.state.borrow_mut().dep_subs.clear();
        let log = DepLog::new();
        let value = track::capture(Some(log.clone()), || (self.compute)());
        let deps = match &self.explicit_deps {
            Some(deps) => deps.clone(),
            None => log.into_deps(),
        };
        let mut dep_subs = Vec::with_capacity(deps.len());
        for dep in deps {
            let weak = Rc::downgrade(self);
            dep_subs.push(dep.0.clone().subscribe_change(Box::new(move || {
                if let Some(node) = weak.upgrade() {
                    node.refresh();
                }
            })));
        }
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = match &state.cached {
                Some(prev) => !value.same_as(prev),
                None => true,
            };
            state.cached = Some(value.clone());
            state.dep_subs = dep_subs;
            changed
        };
        if changed {
            registry::publish(&self.subs, value, true);
        }
    }

    fn subscribe_raw(
        self: &Rc<Self>,
        handler: Box<dyn FnMut(&T)>,
        field_scoped: bool,
    ) -> Subscription {
        if self.subs.borrow().is_empty() {
            self.refresh();
        }
        let value = self
            .state
            .borrow()
            .cached
            .clone()
            .expect("view cache is populated while observed");
        let key = self.subs.borrow_mut().insert(handler, value, field_scoped);
        let node = self.clone();
        Subscription::from_fn(move || {
            let mut reg = node.subs.borrow_mut();
            reg.remove(key);
            if reg.is_empty() {
                drop(reg);
                // Last observer gone: release the cache and every dependency
                // subscription.
                let mut state = node.state.borrow_mut();
                state.cached = None;
                state.dep_subs.clear();
            }
        })
    }
}

impl<T: Value> DepSource for ViewNode<T> {
    fn subscribe_change(self: Rc<Self>, mut on_change: Box<dyn FnMut()>) -> Subscription {
        self.subscribe_raw(Box::new(move |_| on_change()), false)
    }
}

impl<T: Value + std::fmt::Debug> std::fmt::Debug for View<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.state.try_borrow() {
            Ok(state) => match &state.cached {
                Some(value) => std::fmt::Debug::fmt(value, f),
                None => write!(f, "<unobserved>"),
            },
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
