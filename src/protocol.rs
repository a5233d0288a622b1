//! Client-facing resource handles
//!
//! The wire protocol marshaling lives outside of this crate. What the core needs from it are the
//! objects it sends events to: shell surfaces (liveness pings and configure events), pointers and
//! keyboards (enter, leave and input events). They are modeled as traits implemented by the
//! protocol layer, and handed to the core as reference-counted trait objects.
//!
//! Two handles refer to the same resource if they point to the same object, see [`same_resource`].

use std::{fmt, rc::Rc};

use crate::{
    compositor::SurfaceId,
    input::{ButtonState, KeyState},
    shell::ResizeEdge,
    utils::Serial,
};

/// Identifies the client owning a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

/// A shell surface object, as seen by the client that created it
pub trait ShellSurfaceResource: fmt::Debug {
    /// Client owning this resource
    fn client(&self) -> ClientId;
    /// Ask the client to answer with a pong carrying the same serial
    fn ping(&self, serial: Serial);
    /// Suggest a new size for the surface
    fn configure(&self, edges: ResizeEdge, width: i32, height: i32);
}

/// A pointer object bound by a client
pub trait PointerResource: fmt::Debug {
    /// Client owning this resource
    fn client(&self) -> ClientId;
    /// The pointer entered `surface`, at the given surface-local coordinates
    fn enter(&self, serial: Serial, surface: SurfaceId, x: f64, y: f64);
    /// The pointer left `surface`
    fn leave(&self, serial: Serial, surface: SurfaceId);
    /// The pointer moved, coordinates are surface-local
    fn motion(&self, time: u32, x: f64, y: f64);
    /// A button was pressed or released
    fn button(&self, serial: Serial, time: u32, button: u32, state: ButtonState);
}

/// A keyboard object bound by a client
pub trait KeyboardResource: fmt::Debug {
    /// Client owning this resource
    fn client(&self) -> ClientId;
    /// The keyboard focus entered `surface`, `keys` are the currently pressed keys
    fn enter(&self, serial: Serial, surface: SurfaceId, keys: &[u32]);
    /// The keyboard focus left `surface`
    fn leave(&self, serial: Serial, surface: SurfaceId);
    /// A key was pressed or released
    fn key(&self, serial: Serial, time: u32, key: u32, state: KeyState);
}

/// Shared handle to a [`ShellSurfaceResource`]
pub type ShellSurfaceHandle = Rc<dyn ShellSurfaceResource>;
/// Shared handle to a [`PointerResource`]
pub type PointerHandle = Rc<dyn PointerResource>;
/// Shared handle to a [`KeyboardResource`]
pub type KeyboardHandle = Rc<dyn KeyboardResource>;

/// Whether two handles refer to the same resource
///
/// Only the data pointers are compared, vtable pointers of the same object may differ between
/// codegen units.
pub fn same_resource<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

#[cfg(test)]
pub(crate) mod mock {
    //! Resources recording every event they receive

    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum PointerEvent {
        Enter { surface: SurfaceId, x: f64, y: f64 },
        Leave { surface: SurfaceId },
        Motion { x: f64, y: f64 },
        Button { serial: Serial, button: u32, state: ButtonState },
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum KeyboardEvent {
        Enter { surface: SurfaceId },
        Leave { surface: SurfaceId },
        Key { key: u32, state: KeyState },
    }

    #[derive(Debug)]
    pub struct RecordingShellSurface {
        pub client: ClientId,
        pub pings: RefCell<Vec<Serial>>,
        pub configures: RefCell<Vec<(ResizeEdge, i32, i32)>>,
    }

    impl RecordingShellSurface {
        pub fn new(client: ClientId) -> Rc<RecordingShellSurface> {
            Rc::new(RecordingShellSurface {
                client,
                pings: RefCell::new(Vec::new()),
                configures: RefCell::new(Vec::new()),
            })
        }

        pub fn last_ping(&self) -> Option<Serial> {
            self.pings.borrow().last().copied()
        }
    }

    impl ShellSurfaceResource for RecordingShellSurface {
        fn client(&self) -> ClientId {
            self.client
        }
        fn ping(&self, serial: Serial) {
            self.pings.borrow_mut().push(serial);
        }
        fn configure(&self, edges: ResizeEdge, width: i32, height: i32) {
            self.configures.borrow_mut().push((edges, width, height));
        }
    }

    #[derive(Debug)]
    pub struct RecordingPointer {
        pub client: ClientId,
        pub events: RefCell<Vec<PointerEvent>>,
    }

    impl RecordingPointer {
        pub fn new(client: ClientId) -> Rc<RecordingPointer> {
            Rc::new(RecordingPointer {
                client,
                events: RefCell::new(Vec::new()),
            })
        }

        pub fn take(&self) -> Vec<PointerEvent> {
            std::mem::take(&mut *self.events.borrow_mut())
        }
    }

    impl PointerResource for RecordingPointer {
        fn client(&self) -> ClientId {
            self.client
        }
        fn enter(&self, _serial: Serial, surface: SurfaceId, x: f64, y: f64) {
            self.events.borrow_mut().push(PointerEvent::Enter { surface, x, y });
        }
        fn leave(&self, _serial: Serial, surface: SurfaceId) {
            self.events.borrow_mut().push(PointerEvent::Leave { surface });
        }
        fn motion(&self, _time: u32, x: f64, y: f64) {
            self.events.borrow_mut().push(PointerEvent::Motion { x, y });
        }
        fn button(&self, serial: Serial, _time: u32, button: u32, state: ButtonState) {
            self.events
                .borrow_mut()
                .push(PointerEvent::Button { serial, button, state });
        }
    }

    #[derive(Debug)]
    pub struct RecordingKeyboard {
        pub client: ClientId,
        pub events: RefCell<Vec<KeyboardEvent>>,
    }

    impl RecordingKeyboard {
        pub fn new(client: ClientId) -> Rc<RecordingKeyboard> {
            Rc::new(RecordingKeyboard {
                client,
                events: RefCell::new(Vec::new()),
            })
        }

        pub fn take(&self) -> Vec<KeyboardEvent> {
            std::mem::take(&mut *self.events.borrow_mut())
        }
    }

    impl KeyboardResource for RecordingKeyboard {
        fn client(&self) -> ClientId {
            self.client
        }
        fn enter(&self, _serial: Serial, surface: SurfaceId, _keys: &[u32]) {
            self.events.borrow_mut().push(KeyboardEvent::Enter { surface });
        }
        fn leave(&self, _serial: Serial, surface: SurfaceId) {
            self.events.borrow_mut().push(KeyboardEvent::Leave { surface });
        }
        fn key(&self, _serial: Serial, _time: u32, key: u32, state: KeyState) {
            self.events.borrow_mut().push(KeyboardEvent::Key { key, state });
        }
    }
}
