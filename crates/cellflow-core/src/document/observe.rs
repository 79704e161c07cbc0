//! Change notification.
//!
//! Observers are owned by the spreadsheet instance. Subscribing returns a
//! [`Subscription`] that removes the callback when `unsubscribe` is called.
//! Callbacks run synchronously after the state is consistent; they cannot
//! reach the spreadsheet mutably, so reentrant writes are ruled out by the
//! borrow checker rather than by a runtime guard.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use cellflow_engine::engine::CellRef;

/// What changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A write that mutated state, accepted or not.
    CellWritten { cell: CellRef, accepted: bool },
    CellCleared { cell: CellRef },
    Cleared,
    Imported { cells: usize },
}

type Callback = Box<dyn FnMut(&ChangeEvent)>;

struct Entry {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct ObserverList {
    next_id: u64,
    entries: Vec<Entry>,
    notifying: bool,
    /// Entries taken out by the running `notify`.
    in_flight: usize,
    /// In-flight entries unsubscribed by a callback.
    removed_during_notify: Vec<u64>,
}

#[derive(Default)]
pub(crate) struct Observers {
    inner: Rc<RefCell<ObserverList>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, callback: Callback) -> Subscription {
        let mut list = self.inner.borrow_mut();
        let id = list.next_id;
        list.next_id += 1;
        list.entries.push(Entry { id, callback });
        Subscription {
            id,
            list: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn notify(&self, event: &ChangeEvent) {
        // Entries are taken out so a callback may unsubscribe without a double borrow.
        let mut entries = {
            let mut list = self.inner.borrow_mut();
            list.notifying = true;
            list.in_flight = list.entries.len();
            std::mem::take(&mut list.entries)
        };

        for entry in entries.iter_mut() {
            (entry.callback)(event);
        }

        let mut list = self.inner.borrow_mut();
        list.notifying = false;
        list.in_flight = 0;
        let removed = std::mem::take(&mut list.removed_during_notify);
        entries.retain(|e| !removed.contains(&e.id));
        entries.append(&mut list.entries);
        list.entries = entries;
    }

    /// Registered observers, including those being called right now.
    pub(crate) fn len(&self) -> usize {
        let list = self.inner.borrow();
        list.entries.len() + list.in_flight - list.removed_during_notify.len()
    }
}

/// Capability to remove one observer.
#[must_use = "dropping a Subscription keeps the observer registered; call unsubscribe to remove it"]
pub struct Subscription {
    id: u64,
    list: Weak<RefCell<ObserverList>>,
}

impl Subscription {
    /// Remove the observer. A no-op once the spreadsheet is gone.
    pub fn unsubscribe(self) {
        let Some(list) = self.list.upgrade() else {
            return;
        };
        let mut list = list.borrow_mut();
        let before = list.entries.len();
        list.entries.retain(|e| e.id != self.id);
        if list.notifying && list.entries.len() == before {
            list.removed_during_notify.push(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_reaches_every_observer_in_order() {
        let observers = Observers::default();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = seen.clone();
        let _a = observers.subscribe(Box::new(move |_: &ChangeEvent| first.borrow_mut().push("a")));
        let second = seen.clone();
        let _b = observers.subscribe(Box::new(move |_: &ChangeEvent| second.borrow_mut().push("b")));

        observers.notify(&ChangeEvent::Cleared);
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let observers = Observers::default();
        let count = Rc::new(RefCell::new(0));
        let counter = count.clone();
        let sub = observers.subscribe(Box::new(move |_: &ChangeEvent| *counter.borrow_mut() += 1));

        observers.notify(&ChangeEvent::Cleared);
        sub.unsubscribe();
        observers.notify(&ChangeEvent::Cleared);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(observers.len(), 0);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let observers = Observers::default();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(RefCell::new(0));

        let inner_slot = slot.clone();
        let counter = count.clone();
        let sub = observers.subscribe(Box::new(move |_: &ChangeEvent| {
            *counter.borrow_mut() += 1;
            if let Some(sub) = inner_slot.borrow_mut().take() {
                sub.unsubscribe();
            }
        }));
        *slot.borrow_mut() = Some(sub);

        observers.notify(&ChangeEvent::Cleared);
        observers.notify(&ChangeEvent::Cleared);
        assert_eq!(*count.borrow(), 1);
        assert_eq!(observers.len(), 0);
    }

    #[test]
    fn test_len_counts_observers_during_notify() {
        let observers = Observers::default();
        let view = Observers {
            inner: Rc::clone(&observers.inner),
        };
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let _a = observers.subscribe(Box::new(move |_: &ChangeEvent| sink.borrow_mut().push(view.len())));
        let _b = observers.subscribe(Box::new(|_: &ChangeEvent| {}));

        observers.notify(&ChangeEvent::Cleared);
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(observers.len(), 2);
    }

    #[test]
    fn test_len_after_unsubscribe_inside_callback() {
        let observers = Observers::default();
        let view = Observers {
            inner: Rc::clone(&observers.inner),
        };
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let inner_slot = slot.clone();
        let sink = seen.clone();
        let sub = observers.subscribe(Box::new(move |_: &ChangeEvent| {
            if let Some(sub) = inner_slot.borrow_mut().take() {
                sub.unsubscribe();
            }
            sink.borrow_mut().push(view.len());
        }));
        *slot.borrow_mut() = Some(sub);

        observers.notify(&ChangeEvent::Cleared);
        assert_eq!(*seen.borrow(), vec![0]);
        assert_eq!(observers.len(), 0);
    }

    #[test]
    fn test_unsubscribe_after_owner_dropped_is_noop() {
        let observers = Observers::default();
        let sub = observers.subscribe(Box::new(|_: &ChangeEvent| {}));
        drop(observers);
        sub.unsubscribe();
    }
}
