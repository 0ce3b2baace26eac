//! Registration-ordered listener lists.
//!
//! A [`Signal`] holds listeners of some unsized callable type `F` (for example
//! `dyn Fn(&NodeCollection, NodeId)`). Emission is done by the owner: it takes
//! a [`Signal::snapshot`] and calls each listener in registration order. The
//! snapshot is what lets a listener connect, disconnect, or re-enter the
//! owner while the emission is running.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies one connected listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A list of listeners, delivered synchronously in registration order.
pub struct Signal<F: ?Sized> {
    listeners: RefCell<Vec<(SubscriptionId, Rc<F>)>>,
    next_id: Cell<u64>,
}

impl<F: ?Sized> Signal<F> {
    /// Create a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Append a listener.
    pub fn connect(&self, listener: Rc<F>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not connected.
    ///
    /// A listener removed during an emission still receives that emission.
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|(sid, _)| *sid == id) {
            Some(pos) => {
                listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    /// The current listeners, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        self.listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect()
    }

    /// Number of connected listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Returns `true` if nothing is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<F: ?Sized> Default for Signal<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> std::fmt::Debug for Signal<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Listener = dyn Fn(&RefCell<Vec<u32>>);

    fn emit(signal: &Signal<Listener>, log: &RefCell<Vec<u32>>) {
        for listener in signal.snapshot() {
            listener(log);
        }
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let signal: Signal<Listener> = Signal::new();
        signal.connect(Rc::new(|log: &RefCell<Vec<u32>>| log.borrow_mut().push(1)));
        signal.connect(Rc::new(|log: &RefCell<Vec<u32>>| log.borrow_mut().push(2)));
        signal.connect(Rc::new(|log: &RefCell<Vec<u32>>| log.borrow_mut().push(3)));

        let log = RefCell::new(Vec::new());
        emit(&signal, &log);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_disconnect() {
        let signal: Signal<Listener> = Signal::new();
        let first = signal.connect(Rc::new(|log: &RefCell<Vec<u32>>| log.borrow_mut().push(1)));
        signal.connect(Rc::new(|log: &RefCell<Vec<u32>>| log.borrow_mut().push(2)));

        assert!(signal.disconnect(first));
        assert!(!signal.disconnect(first));
        assert_eq!(signal.len(), 1);

        let log = RefCell::new(Vec::new());
        emit(&signal, &log);
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn test_listener_may_disconnect_itself_during_emission() {
        let signal: Rc<Signal<Listener>> = Rc::new(Signal::new());
        let id = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&signal);
        let own_id = Rc::clone(&id);
        let sid = signal.connect(Rc::new(move |log: &RefCell<Vec<u32>>| {
            log.borrow_mut().push(7);
            if let (Some(signal), Some(sid)) = (weak.upgrade(), own_id.get()) {
                signal.disconnect(sid);
            }
        }));
        id.set(Some(sid));

        let log = RefCell::new(Vec::new());
        emit(&signal, &log);
        emit(&signal, &log);
        assert_eq!(*log.borrow(), vec![7]);
        assert!(signal.is_empty());
    }
}
