use std::{cell::RefCell, rc::Rc};

use slabmap::SlabMap;

use crate::value::Value;

/// Revision of every reactive value before its first accepted write.
pub(crate) const FIRST_REVISION: u64 = 1;

type Handler<T> = Rc<RefCell<Box<dyn FnMut(&T)>>>;

/// One registered subscriber and the last delivery it received.
struct Subscriber<T> {
    handler: Handler<T>,
    last_value: T,
    last_rev: u64,
    seq: u64,
    field_scoped: bool,
}

/// Per-node subscriber set plus the node's revision bookkeeping.
pub(crate) struct Registry<T> {
    subs: SlabMap<Subscriber<T>>,
    revision: u64,
    /// Revision of the most recent pass that included field-scoped
    /// subscribers. A pass that finds this ahead of its own starting
    /// revision has been superseded.
    field_round: u64,
    /// Registration sequence, independent of the slab keys, which are
    /// recycled after removal.
    next_seq: u64,
}

impl<T: Value> Registry<T> {
    pub fn new() -> Self {
        Self {
            subs: SlabMap::new(),
            revision: FIRST_REVISION,
            field_round: FIRST_REVISION,
            next_seq: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Registers a subscriber primed with the current value and revision, so
    /// it is not invoked until the next accepted change.
    pub fn insert(&mut self, handler: Box<dyn FnMut(&T)>, value: T, field_scoped: bool) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.subs.insert(Subscriber {
            handler: Rc::new(RefCell::new(handler)),
            last_value: value,
            last_rev: self.revision,
            seq,
            field_scoped,
        })
    }

    pub fn remove(&mut self, key: usize) {
        self.subs.remove(key);
    }
}

/// Bumps the revision and runs one notification pass.
///
/// `value` is the snapshot delivered to every subscriber of this pass.
/// Subscribers are visited in registration order, over a snapshot of the
/// subscriber list, so handlers may subscribe and unsubscribe freely while
/// the pass runs. A handler that panics propagates to the caller of the
/// triggering write; records already updated stay updated, and subscribers
/// later in the pass catch up on the next accepted change.
pub(crate) fn publish<T: Value>(registry: &RefCell<Registry<T>>, value: T, include_field: bool) {
    let (start_rev, entries) = {
        let mut reg = registry.borrow_mut();
        reg.revision += 1;
        let start_rev = reg.revision;
        if include_field {
            reg.field_round = start_rev;
        }
        reg.subs.optimize();
        // Slab keys are recycled, so key order is not registration order;
        // the snapshot sorts by the sequence number instead.
        let mut entries: Vec<(u64, usize)> =
            reg.subs.iter().map(|(key, sub)| (sub.seq, key)).collect();
        entries.sort_unstable();
        (start_rev, entries)
    };
    for (_, key) in entries {
        let handler = {
            let mut reg = registry.borrow_mut();
            if reg.field_round > start_rev {
                // A re-entrant write started a more inclusive round for a
                // newer revision; it reaches everyone left in this one.
                return;
            }
            let Some(sub) = reg.subs.get_mut(key) else {
                continue;
            };
            if sub.field_scoped && !include_field {
                continue;
            }
            if sub.last_rev > start_rev {
                continue;
            }
            if value.same_as(&sub.last_value) {
                continue;
            }
            sub.last_value = value.clone();
            sub.last_rev = start_rev;
            sub.handler.clone()
        };
        // The registry borrow is released here, so the handler may write,
        // subscribe or unsubscribe re-entrantly. A handler that is still
        // running is not re-entered; its record above already reflects the
        // delivery.
        let Ok(mut handler) = handler.try_borrow_mut() else {
            continue;
        };
        handler(&value);
    }
}
