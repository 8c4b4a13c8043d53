use std::{cell::RefCell, rc::Rc};

use derive_ex::derive_ex;
use serde::{Deserialize, Serialize};

use crate::{
    lens::Lens,
    registry::{self, Registry},
    subscription::Subscription,
    track::{self, Dep, DepSource},
    value::Value,
};

#[cfg(test)]
mod tests;

/// A writable reactive value container.
///
/// Reading a `Cell` inside a [`View`](crate::View) computation registers the
/// cell as a dependency of that view. Writing it synchronously drives every
/// dependent recomputation and notification before `set` returns.
///
/// Cloning the handle is cheap and refers to the same underlying cell.
#[derive_ex(Clone, bound())]
pub struct Cell<T: Value>(Rc<CellNode<T>>);

struct CellNode<T: Value> {
    value: RefCell<T>,
    subs: RefCell<Registry<T>>,
}

impl<T: Value> Cell<T> {
    /// Creates a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self(Rc::new(CellNode {
            value: RefCell::new(value),
            subs: RefCell::new(Registry::new()),
        }))
    }

    /// Returns the current value, reporting the read to the capture stack.
    pub fn get(&self) -> T {
        track::report(&(self.0.clone() as Rc<dyn DepSource>));
        self.0.value.borrow().clone()
    }

    /// Stores `value` and synchronously notifies subscribers.
    ///
    /// A write whose value is [`same_as`](Value::same_as) the current one is
    /// a no-op: no revision bump, no notification.
    pub fn set(&self, value: T) {
        self.0.write(value, true);
    }

    /// Monotonic revision counter, starting at 1 and bumped exactly once per
    /// accepted write. A cheap "did anything change" check that avoids value
    /// comparison.
    pub fn revision(&self) -> u64 {
        self.0.subs.borrow().revision()
    }

    /// Registers `f` to run on every accepted change, in registration order.
    ///
    /// `f` is not invoked with the current value at registration time.
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe(&self, f: impl FnMut(&T) + 'static) -> Subscription {
        self.0.subscribe_raw(Box::new(f), false)
    }

    /// Erased handle for [`View::with_deps`](crate::View::with_deps).
    pub fn as_dep(&self) -> Dep {
        Dep(self.0.clone())
    }

    /// Returns a two-way lens onto one part of this cell's value.
    ///
    /// `get` extracts the part, `set` writes it back into the whole. Writes
    /// through the lens update this cell; writes to this cell propagate to
    /// the lens. The lens subscribes to this cell only while it has
    /// subscribers of its own.
    ///
    /// ```
    /// use boxcell::Cell;
    ///
    /// #[derive(Clone, Debug)]
    /// struct Point {
    ///     x: i32,
    ///     y: i32,
    /// }
    /// impl boxcell::Value for Point {}
    ///
    /// let p = Cell::new(Point { x: 1, y: 2 });
    /// let x = p.lens(|p: &Point| p.x, |p, x| p.x = x);
    /// x.set(10);
    /// assert_eq!(p.get().x, 10);
    /// p.set(Point { x: 7, y: 2 });
    /// assert_eq!(x.get(), 7);
    /// ```
    pub fn lens<U: Value>(
        &self,
        get: impl Fn(&T) -> U + 'static,
        set: impl Fn(&mut T, U) + 'static,
    ) -> Lens<U> {
        let get = Rc::new(get);
        let read = {
            let node = self.0.clone();
            let get = get.clone();
            Box::new(move || get(&node.value.borrow()))
        };
        let write = {
            let node = self.0.clone();
            Box::new(move |field: U| {
                let mut value = node.value.borrow().clone();
                set(&mut value, field);
                // The field-scoped path: sibling lenses are not told "the
                // whole value may have changed".
                node.write(value, false);
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

impl<T: Value> CellNode<T> {
    fn write(&self, value: T, include_field: bool) {
        if value.same_as(&self.value.borrow()) {
            return;
        }
        *self.value.borrow_mut() = value.clone();
        registry::publish(&self.subs, value, include_field);
    }

    fn subscribe_raw(
        self: &Rc<Self>,
        handler: Box<dyn FnMut(&T)>,
        field_scoped: bool,
    ) -> Subscription {
        let value = self.value.borrow().clone();
        let key = self.subs.borrow_mut().insert(handler, value, field_scoped);
        let node = self.clone();
        Subscription::from_fn(move || {
            node.subs.borrow_mut().remove(key);
        })
    }
}

impl<T: Value> DepSource for CellNode<T> {
    fn subscribe_change(self: Rc<Self>, mut on_change: Box<dyn FnMut()>) -> Subscription {
        self.subscribe_raw(Box::new(move |_| on_change()), false)
    }
}

impl<T: Value + Default> Default for Cell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Value + std::fmt::Debug> std::fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => std::fmt::Debug::fmt(&*value, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}

impl<T> Serialize for Cell<T>
where
    T: Value + Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        match self.0.value.try_borrow() {
            Ok(value) => T::serialize(&value, serializer),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}

impl<'de, T> Deserialize<'de> for Cell<T>
where
    T: Value + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Cell<T>, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Cell::new)
    }
}
