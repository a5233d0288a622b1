//! Input abstractions
//!
//! This module provides a [`Seat`] grouping a [`PointerDevice`] and a [`KeyboardDevice`]. The
//! devices track focus and grab state and forward input events to the resources bound by the
//! focused client.
//!
//! ## Grabs
//!
//! Pressing a button on a view starts an implicit grab: every pointer event goes to that view until
//! the last button is released, even if the pointer leaves it. The serial of the press identifies the
//! grab. Clients use it to request interactive operations (move, resize), which install a
//! motion callback with [`PointerDevice::grab_motion`]. The callback stays active only as long as the
//! grab it was installed for, so a stale serial never moves anything.
//!
//! Every change of the grab target is announced on [`PointerDevice::grab_signal`] as a
//! [`PointerGrab`] value.

use std::fmt;

pub mod keyboard;
pub mod pointer;

pub use self::keyboard::{KeyboardDevice, KeyboardFocusGained};
pub use self::pointer::{Cursor, GrabMotion, MotionEvent, PointerDevice, PointerGrab};

/// State of a button on a pointer device, like mouse or tablet tool
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}

/// State of key on a keyboard
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KeyState {
    /// Key is released
    Released,
    /// Key is pressed
    Pressed,
}

/// A seat, the set of input devices used by one user
pub struct Seat {
    name: String,
    /// The pointer of this seat
    pub pointer: PointerDevice,
    /// The keyboard of this seat
    pub keyboard: KeyboardDevice,
}

impl fmt::Debug for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seat")
            .field("name", &self.name)
            .field("pointer", &self.pointer)
            .field("keyboard", &self.keyboard)
            .finish()
    }
}

impl Seat {
    /// Create a new seat, with a pointer and a keyboard
    pub fn new<N: Into<String>>(name: N) -> Seat {
        Seat {
            name: name.into(),
            pointer: PointerDevice::new(),
            keyboard: KeyboardDevice::new(),
        }
    }

    /// Name of this seat, as advertised to clients
    pub fn name(&self) -> &str {
        &self.name
    }
}
