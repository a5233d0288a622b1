//! Keyboard focus and key delivery

use std::fmt;

use tracing::{debug, instrument, trace};

use crate::{
    compositor::{SurfaceId, Surfaces},
    protocol::KeyboardHandle,
    utils::{Serial, SERIAL_COUNTER},
};

use super::KeyState;

/// Emitted on a surface right after it gained the keyboard focus
///
/// Listeners run after `enter` was sent to the client's keyboards, and may still take the focus
/// away again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardFocusGained {
    /// The surface that gained the focus
    pub surface: SurfaceId,
    /// Serial of the `enter` event
    pub serial: Serial,
}

/// A keyboard device
///
/// Key events are delivered to the keyboard resources currently focused on the focused surface, see
/// [`Surface::keyboard_focuses`](crate::compositor::Surface::keyboard_focuses).
#[derive(Default)]
pub struct KeyboardDevice {
    resources: Vec<KeyboardHandle>,
    focus: Option<SurfaceId>,
    pressed: Vec<u32>,
}

impl fmt::Debug for KeyboardDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardDevice")
            .field("resources", &self.resources.len())
            .field("focus", &self.focus)
            .field("pressed", &self.pressed)
            .finish()
    }
}

impl KeyboardDevice {
    /// Create a keyboard without focus
    pub fn new() -> KeyboardDevice {
        KeyboardDevice::default()
    }

    /// Register a keyboard resource bound by a client
    pub fn add_resource(&mut self, resource: KeyboardHandle) {
        self.resources.push(resource);
    }

    /// Forget a keyboard resource
    pub fn remove_resource(&mut self, resource: &KeyboardHandle) {
        self.resources
            .retain(|r| !crate::protocol::same_resource(r, resource));
    }

    /// The focused surface
    pub fn focus(&self) -> Option<SurfaceId> {
        self.focus
    }

    /// Keys currently held down
    pub fn pressed(&self) -> &[u32] {
        &self.pressed
    }

    /// A serial for a keyboard event
    pub fn next_keyboard_serial(&self) -> Serial {
        SERIAL_COUNTER.next_serial()
    }

    /// Move the keyboard focus
    ///
    /// Keyboards focused on the previous surface receive `leave`. The client's keyboards become
    /// focused on the new surface and receive `enter`, then the surface's
    /// [`KeyboardFocusGained`] signal is emitted.
    #[instrument(level = "debug", skip(self, surfaces))]
    pub fn set_focus(&mut self, surfaces: &Surfaces, focus: Option<SurfaceId>) {
        if self.focus == focus {
            return;
        }
        let serial = self.next_keyboard_serial();

        if let Some(old) = self.focus.and_then(|id| surfaces.get(id)) {
            let leaving = old.keyboard_focuses().take();
            for resource in leaving {
                resource.leave(serial, old.id());
            }
        }

        self.focus = focus;
        let Some(surface) = focus.and_then(|id| surfaces.get(id)) else {
            return;
        };

        let focused: Vec<KeyboardHandle> = self
            .resources
            .iter()
            .filter(|r| r.client() == surface.client())
            .cloned()
            .collect();
        surface.keyboard_focuses().replace(focused.clone());
        for resource in &focused {
            resource.enter(serial, surface.id(), &self.pressed);
        }
        debug!(surface = ?surface.id(), keyboards = focused.len(), "keyboard focus changed");

        surface.keyboard_focus_gained().signal(&KeyboardFocusGained {
            surface: surface.id(),
            serial,
        });
    }

    /// Handle a key event, returns the serial sent along with it
    #[instrument(level = "trace", skip(self, surfaces))]
    pub fn key(&mut self, surfaces: &Surfaces, key: u32, state: KeyState, time: u32) -> Serial {
        match state {
            KeyState::Pressed => {
                if !self.pressed.contains(&key) {
                    self.pressed.push(key);
                }
            }
            KeyState::Released => self.pressed.retain(|k| *k != key),
        }

        let serial = self.next_keyboard_serial();
        let Some(surface) = self.focus.and_then(|id| surfaces.get(id)) else {
            trace!("key event without focus");
            return serial;
        };
        for resource in surface.keyboard_focuses().handles() {
            resource.key(serial, time, key, state);
        }
        serial
    }

    /// Drop the focus if it is on `surface`, without notifying anyone
    pub(crate) fn forget_surface(&mut self, surface: SurfaceId) {
        if self.focus == Some(surface) {
            self.focus = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        protocol::{
            mock::{KeyboardEvent, RecordingKeyboard},
            ClientId,
        },
        utils::Size,
    };

    #[test]
    fn focus_moves_between_clients() {
        let mut surfaces = Surfaces::new();
        let first = surfaces.create(ClientId(1), Size::new(10, 10));
        let second = surfaces.create(ClientId(2), Size::new(10, 10));
        let kbd1 = RecordingKeyboard::new(ClientId(1));
        let kbd2 = RecordingKeyboard::new(ClientId(2));
        let mut keyboard = KeyboardDevice::new();
        keyboard.add_resource(kbd1.clone());
        keyboard.add_resource(kbd2.clone());

        keyboard.set_focus(&surfaces, Some(first));
        keyboard.key(&surfaces, 30, KeyState::Pressed, 0);
        keyboard.set_focus(&surfaces, Some(second));

        assert_eq!(
            kbd1.take(),
            vec![
                KeyboardEvent::Enter { surface: first },
                KeyboardEvent::Key {
                    key: 30,
                    state: KeyState::Pressed
                },
                KeyboardEvent::Leave { surface: first },
            ]
        );
        assert_eq!(kbd2.take(), vec![KeyboardEvent::Enter { surface: second }]);
        assert!(surfaces.get(first).unwrap().keyboard_focuses().is_empty());
        assert_eq!(surfaces.get(second).unwrap().keyboard_focuses().len(), 1);
    }

    #[test]
    fn focus_gained_is_signaled_after_enter() {
        let mut surfaces = Surfaces::new();
        let surface = surfaces.create(ClientId(1), Size::new(10, 10));
        let kbd = RecordingKeyboard::new(ClientId(1));
        let mut keyboard = KeyboardDevice::new();
        keyboard.add_resource(kbd.clone());

        let entered_before_signal = Rc::new(Cell::new(false));
        {
            let kbd = kbd.clone();
            let entered_before_signal = entered_before_signal.clone();
            surfaces
                .get(surface)
                .unwrap()
                .keyboard_focus_gained()
                .connect(move |_| entered_before_signal.set(!kbd.events.borrow().is_empty()));
        }

        keyboard.set_focus(&surfaces, Some(surface));
        assert!(entered_before_signal.get());
    }
}
