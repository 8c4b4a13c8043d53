//! Fine-grained reactive cells with automatic dependency tracking.
//!
//! `boxcell` propagates changes in mutable state to exactly the consumers
//! that depend on them: no manual subscription lists, no redundant
//! recomputation, no stale deliveries, and no subscriptions left behind for
//! derived values nobody observes anymore.
//!
//! Three reactive types share one interface surface (read, write, revision,
//! subscribe):
//!
//! - [`Cell`] — the writable container. Writes synchronously notify every
//!   subscriber whose last seen value differs under the [`Value`] policy.
//! - [`View`] — a read-only derived value. Dependencies are discovered by
//!   running the compute function under a capture frame: every cell, view or
//!   lens it reads becomes a dependency. Unobserved views recompute on each
//!   read and retain nothing; observed views cache and push.
//! - [`Lens`] — a writable, two-way view onto one part of a parent value,
//!   built from a `(get, set)` closure pair, chainable to any depth.
//!
//! Propagation is synchronous and depth-first: when `set` returns,
//! everything downstream is already consistent. The engine performs no I/O
//! and owns no scheduler; handles are `Rc`-based and single-threaded, with
//! the capture stack kept in a thread local.
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//!
//! use boxcell::{Cell, View};
//!
//! let a = Cell::new(2);
//! let b = Cell::new(2);
//! let sum = {
//!     let (a, b) = (a.clone(), b.clone());
//!     View::new(move || a.get() + b.get())
//! };
//! assert_eq!(sum.get(), 4);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sub = {
//!     let seen = seen.clone();
//!     sum.subscribe(move |value| seen.borrow_mut().push(*value))
//! };
//! a.set(3);
//! b.set(3);
//! assert_eq!(*seen.borrow(), vec![5, 6]);
//! drop(sub);
//! ```

mod cell;
mod lens;
mod registry;
mod subscription;
mod track;
mod value;
mod view;

pub use cell::Cell;
pub use lens::Lens;
pub use subscription::Subscription;
pub use track::{untracked, Dep};
pub use value::Value;
pub use view::View;
