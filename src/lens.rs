use std::{cell::RefCell, rc::Rc};

use derive_ex::derive_ex;

use crate::{
    registry::{self, Registry},
    subscription::Subscription,
    track::{self, Dep, DepSource},
    value::Value,
};


/// Where a lens write came from, which decides how it propagates.
#[derive(Clone, Copy)]
enum WriteOrigin {
    /// A caller wrote through the public API.
    External,
    /// A child lens wrote its part back up.
    Child,
    /// The parent delivered a field update downward.
    Parent,
}

/// A writable, two-way view onto one part of a parent reactive value.
///
/// Created with [`Cell::lens`](crate::Cell::lens) or [`Lens::lens`], from a
/// `(get, set)` closure pair. Writing through the lens rewrites the parent's
/// value; writing the parent updates the lens. Parent writes triggered by a
/// lens travel on a field-scoped path, so sibling lenses on other parts of
/// the same parent are not told "the whole value may have changed".
///
/// Like a [`View`](crate::View), a lens maintains its cache and its parent
/// subscription only while it has subscribers of its own; an unsubscribed
/// lens holds no live subscription to its parent, at any depth of a chain.
#[derive_ex(Clone, bound())]
pub struct Lens<T: Value>(Rc<LensNode<T>>);

struct LensNode<T: Value> {
    read_parent: Box<dyn Fn() -> T>,
    write_parent: Box<dyn Fn(T)>,
    bind_parent: Box<dyn Fn(Box<dyn FnMut(&T)>) -> Subscription>,
    subs: RefCell<Registry<T>>,
    state: RefCell<LensState<T>>,
}

struct LensState<T> {
    cached: Option<T>,
    parent_sub: Option<Subscription>,
}

impl<T: Value> Lens<T> {
    pub(crate) fn from_parts(
        read_parent: Box<dyn Fn() -> T>,
        write_parent: Box<dyn Fn(T)>,
        bind_parent: Box<dyn Fn(Box<dyn FnMut(&T)>) -> Subscription>,
    ) -> Self {
        Self(Rc::new(LensNode {
            read_parent,
            write_parent,
            bind_parent,
            subs: RefCell::new(Registry::new()),
            state: RefCell::new(LensState {
                cached: None,
                parent_sub: None,
            }),
        }))
    }

    /// Returns the current value, reporting the read to the capture stack.
    ///
    /// While subscribed this is the cached field value; otherwise the lens
    /// reads through to the parent. The read-through goes straight to the
    /// parent's storage, so an enclosing computation depends on the lens,
    /// not additionally on the parent.
    pub fn get(&self) -> T {
        track::report(&(self.0.clone() as Rc<dyn DepSource>));
        self.0.current()
    }

    /// Writes the field value, updating the parent through its field-scoped
    /// path. A write that is [`same_as`](Value::same_as) the current value is
    /// a no-op.
    pub fn set(&self, value: T) {
        self.0.write(value, WriteOrigin::External);
    }

    /// Monotonic revision counter of this lens, independent of the parent's.
    pub fn revision(&self) -> u64 {
        self.0.subs.borrow().revision()
    }

    /// Registers `f` to run whenever the field value changes.
    ///
    /// The first subscriber binds the lens to its parent; dropping the last
    /// [`Subscription`] releases the parent subscription and the cache.
    pub fn subscribe(&self, f: impl FnMut(&T) + 'static) -> Subscription {
        self.0.subscribe_raw(Box::new(f), false)
    }

    /// Erased handle for [`View::with_deps`](crate::View::with_deps).
    pub fn as_dep(&self) -> Dep {
        Dep(self.0.clone())
    }

    /// Returns a lens onto one part of this lens's value. Chained lenses
    /// round-trip at every depth, and each level gates its parent
    /// subscription on its own subscriber count.
    pub fn lens<U: Value>(
        &self,
        get: impl Fn(&T) -> U + 'static,
        set: impl Fn(&mut T, U) + 'static,
    ) -> Lens<U> {
        let get = Rc::new(get);
        let read = {
            let node = self.0.clone();
            let get = get.clone();
            Box::new(move || get(&node.current()))
        };
        let write = {
            let node = self.0.clone();
            Box::new(move |field: U| {
                let mut value = node.current();
                set(&mut value, field);
                node.write(value, WriteOrigin::Child);
            })
        };
        let bind = {
            let node = self.0.clone();
            Box::new(move |mut f: Box<dyn FnMut(&U)>| {
                let get = get.clone();
                node.subscribe_raw(Box::new(move |value: &T| f(&get(value))), true)
            })
        };
        Lens::from_parts(read, write, bind)
    }
}

impl<T: Value> LensNode<T> {
    /// Cached value while observed, read-through otherwise.
    fn current(&self) -> T {
        if let Some(value) = self.state.borrow().cached.clone() {
            return value;
        }
        (self.read_parent)()
    }

    fn write(self: &Rc<Self>, value: T, origin: WriteOrigin) {
        if value.same_as(&self.current()) {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            if state.cached.is_some() {
                state.cached = Some(value.clone());
            }
        }
        // Parent first: a subscriber notified below may read back through
        // the parent (an unobserved view recomputing, a detached sibling)
        // and must already see the new value there.
        match origin {
            // Parent-triggered updates never flow back up.
            WriteOrigin::Parent => {}
            WriteOrigin::External | WriteOrigin::Child => (self.write_parent)(value.clone()),
        }
        // A write arriving from a child concerns a single sub-part; the
        // field-scoped subscribers here are that child's siblings and are
        // skipped, exactly as the parent skips its lenses on write-back.
        let include_field = !matches!(origin, WriteOrigin::Child);
        registry::publish(&self.subs, value, include_field);
    }

    /// Binds to the parent and snapshots the field value. Runs when the
    /// subscriber count rises from zero.
    fn attach(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let parent_sub = (self.bind_parent)(Box::new(move |value: &T| {
            if let Some(node) = weak.upgrade() {
                node.write(value.clone(), WriteOrigin::Parent);
            }
        }));
        let mut state = self.state.borrow_mut();
        state.cached = Some((self.read_parent)());
        state.parent_sub = Some(parent_sub);
    }

    fn subscribe_raw(
        self: &Rc<Self>,
        handler: Box<dyn FnMut(&T)>,
        field_scoped: bool,
    ) -> Subscription {
        if self.subs.borrow().is_empty() {
            self.attach();
        }
        let value = self.current();
        let key = self.subs.borrow_mut().insert(handler, value, field_scoped);
        let node = self.clone();
        Subscription::from_fn(move || {
            let mut reg = node.subs.borrow_mut();
            reg.remove(key);
            if reg.is_empty() {
                drop(reg);
                // Last observer gone: release the cache and the parent
                // subscription.
                let mut state = node.state.borrow_mut();
                state.cached = None;
                state.parent_sub = None;
            }
        })
    }
}

impl<T: Value> DepSource for LensNode<T> {
    fn subscribe_change(self: Rc<Self>, mut on_change: Box<dyn FnMut()>) -> Subscription {
        self.subscribe_raw(Box::new(move |_| on_change()), false)
    }
}

impl<T: Value + std::fmt::Debug> std::fmt::Debug for Lens<T> {
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
