//! Signal/slot dispatch for single-threaded listeners.
//!
//! A [`Signaler`] keeps its slots in registration order. Every call to [`Signaler::signal`] takes a
//! snapshot of the connected slots before invoking any of them, so a slot may connect or disconnect
//! slots (itself included) while it runs without disturbing the pass in progress. Slots connected
//! during a pass only see the next signal.
//!
//! ```
//! use std::{cell::Cell, rc::Rc};
//! use compositor_core::utils::signaling::Signaler;
//!
//! let signaler = Signaler::<u32>::new();
//! let token = Rc::new(Cell::new(None));
//! let seen = Rc::new(Cell::new(0));
//!
//! let handle = signaler.clone();
//! let own_token = token.clone();
//! let counter = seen.clone();
//! token.set(Some(signaler.connect(move |value| {
//!     counter.set(*value);
//!     // one-shot: disconnect ourselves on the first event
//!     if let Some(token) = own_token.take() {
//!         handle.disconnect(token);
//!     }
//! })));
//!
//! signaler.signal(&7);
//! signaler.signal(&8);
//! assert_eq!(seen.get(), 7);
//! assert!(signaler.is_empty());
//! ```

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

/// Identifies a connected slot, used to disconnect it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalToken(u64);

type Slot<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct SignalerInner<E> {
    next_token: Cell<u64>,
    slots: RefCell<Vec<(SignalToken, Slot<E>)>>,
}

/// An ordered list of listeners for events of type `E`
///
/// Clones share the same slot list.
pub struct Signaler<E> {
    inner: Rc<SignalerInner<E>>,
}

impl<E> Clone for Signaler<E> {
    fn clone(&self) -> Signaler<E> {
        Signaler {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for Signaler<E> {
    fn default() -> Self {
        Signaler::new()
    }
}

impl<E> fmt::Debug for Signaler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signaler")
            .field("slots", &self.inner.slots.borrow().len())
            .finish()
    }
}

impl<E> Signaler<E> {
    /// Create a signaler without any slot
    pub fn new() -> Signaler<E> {
        Signaler {
            inner: Rc::new(SignalerInner {
                next_token: Cell::new(0),
                slots: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Connect a slot, it will be invoked after all previously connected slots
    pub fn connect<F: FnMut(&E) + 'static>(&self, slot: F) -> SignalToken {
        let token = SignalToken(self.inner.next_token.get());
        self.inner.next_token.set(token.0 + 1);
        let slot: Slot<E> = Rc::new(RefCell::new(slot));
        self.inner.slots.borrow_mut().push((token, slot));
        token
    }

    /// Disconnect a slot
    ///
    /// Returns `false` if the slot was not connected (anymore).
    pub fn disconnect(&self, token: SignalToken) -> bool {
        let mut slots = self.inner.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|(t, _)| *t != token);
        slots.len() != before
    }

    /// Whether the given slot is currently connected
    pub fn is_connected(&self, token: SignalToken) -> bool {
        self.inner.slots.borrow().iter().any(|(t, _)| *t == token)
    }

    /// Number of connected slots
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Whether no slot is connected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every slot connected at the time of the call, in registration order
    pub fn signal(&self, event: &E) {
        let snapshot: Vec<Slot<E>> = self
            .inner
            .slots
            .borrow()
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();

        for slot in snapshot {
            // a slot re-emitting its own signal does not get invoked recursively
            if let Ok(mut slot) = slot.try_borrow_mut() {
                (&mut *slot)(event);
            }
        }
    }
}
