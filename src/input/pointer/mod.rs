use std::fmt;

use tracing::{debug, instrument, trace};

use crate::{
    compositor::{SurfaceId, Surfaces},
    desktop::{Scene, ViewId},
    protocol::{ClientId, PointerHandle},
    utils::{signaling::Signaler, Point, Serial, SERIAL_COUNTER},
};

use super::ButtonState;

mod grab;

pub use self::grab::{GrabMotion, PointerGrab};

/// Pointer motion event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    /// Location of the pointer in global coordinates
    pub location: Point<f64>,
    /// Timestamp in milliseconds
    pub time: u32,
}

/// A surface drawn as the pointer image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    /// The surface holding the cursor role
    pub surface: SurfaceId,
    /// The view of that surface in the overlay layer
    pub view: ViewId,
    /// Offset of the hotspot from the surface origin
    pub hotspot: Point<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Focus {
    view: ViewId,
    surface: SurfaceId,
    client: ClientId,
}

/// A pointer device
///
/// Tracks the pointer location, the view under it and the implicit grab started by button presses.
pub struct PointerDevice {
    resources: Vec<PointerHandle>,
    location: Point<f64>,
    focus: Option<Focus>,
    grab: Option<ViewId>,
    grab_serial: Option<Serial>,
    pressed: Vec<u32>,
    grab_motion: Option<GrabMotion>,
    grab_signal: Signaler<PointerGrab>,
    cursor: Option<Cursor>,
}

impl fmt::Debug for PointerDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerDevice")
            .field("resources", &self.resources.len())
            .field("location", &self.location)
            .field("focus", &self.focus)
            .field("grab", &self.grab)
            .field("grab_serial", &self.grab_serial)
            .field("pressed", &self.pressed)
            .field("grab_motion", &self.grab_motion)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Default for PointerDevice {
    fn default() -> Self {
        PointerDevice::new()
    }
}

impl PointerDevice {
    /// Create a pointer at the origin, without focus nor grab
    pub fn new() -> PointerDevice {
        PointerDevice {
            resources: Vec::new(),
            location: Point::new(0.0, 0.0),
            focus: None,
            grab: None,
            grab_serial: None,
            pressed: Vec::new(),
            grab_motion: None,
            grab_signal: Signaler::new(),
            cursor: None,
        }
    }

    /// Register a pointer resource bound by a client
    pub fn add_resource(&mut self, resource: PointerHandle) {
        self.resources.push(resource);
    }

    /// Forget a pointer resource
    pub fn remove_resource(&mut self, resource: &PointerHandle) {
        self.resources
            .retain(|r| !crate::protocol::same_resource(r, resource));
    }

    /// Pointer resources bound by `client`
    pub fn resources_of(&self, client: ClientId) -> Vec<PointerHandle> {
        self.resources
            .iter()
            .filter(|r| r.client() == client)
            .cloned()
            .collect()
    }

    /// Current location, in global coordinates
    pub fn position(&self) -> Point<f64> {
        self.location
    }

    /// The view under the pointer, as last announced with an `enter` event
    pub fn focus(&self) -> Option<ViewId> {
        self.focus.map(|focus| focus.view)
    }

    /// The view holding the current grab, if any
    pub fn grab(&self) -> Option<ViewId> {
        self.grab
    }

    /// Serial of the button press that started the current grab
    pub fn grab_serial(&self) -> Option<Serial> {
        self.grab_serial
    }

    /// Whether a grab identified by `serial` is active
    pub fn has_grab(&self, serial: Serial) -> bool {
        self.grab.is_some() && self.grab_serial == Some(serial)
    }

    /// Buttons currently held down
    pub fn pressed(&self) -> &[u32] {
        &self.pressed
    }

    /// Signal announcing every change of the grab target
    pub fn grab_signal(&self) -> &Signaler<PointerGrab> {
        &self.grab_signal
    }

    /// The current cursor surface
    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub(crate) fn replace_cursor(&mut self, cursor: Option<Cursor>) -> Option<Cursor> {
        std::mem::replace(&mut self.cursor, cursor)
    }

    /// A serial for an `enter` event
    pub fn next_enter_serial(&self) -> Serial {
        SERIAL_COUNTER.next_serial()
    }

    /// A serial for a `leave` event
    pub fn next_leave_serial(&self) -> Serial {
        SERIAL_COUNTER.next_serial()
    }

    /// Install a callback invoked on every motion event while the grab `serial` lasts
    ///
    /// Returns `false`, and drops the callback, if `serial` does not identify the active grab.
    pub fn grab_motion<F>(&mut self, serial: Serial, callback: F) -> bool
    where
        F: FnMut(&mut Scene, &MotionEvent) + 'static,
    {
        if !self.has_grab(serial) {
            debug!(?serial, current = ?self.grab_serial, "refusing grab motion for a stale serial");
            return false;
        }
        self.grab_motion = Some(GrabMotion {
            serial,
            callback: Box::new(callback),
        });
        true
    }

    /// Handle a motion event
    ///
    /// Returns whether the scene was modified, either by a grab callback or by moving the cursor.
    #[instrument(level = "trace", skip(self, scene, surfaces))]
    pub fn motion(&mut self, scene: &mut Scene, surfaces: &Surfaces, event: &MotionEvent) -> bool {
        self.location = event.location;
        let cursor_moved = self.move_cursor(scene);

        let grab_valid = matches!(&self.grab_motion, Some(motion) if self.has_grab(motion.serial));
        if grab_valid {
            if let Some(motion) = self.grab_motion.as_mut() {
                (motion.callback)(scene, event);
            }
            return true;
        }
        if let Some(stale) = self.grab_motion.take() {
            trace!(serial = ?stale.serial, "dropping stale grab motion");
        }

        if let Some(grab) = self.grab {
            // the implicit grab keeps the pressed view focused
            if let (Some(focus), Some(local)) = (self.focus, scene.to_local(grab, event.location)) {
                if focus.view == grab {
                    for resource in self.resources.iter().filter(|r| r.client() == focus.client) {
                        resource.motion(event.time, local.x, local.y);
                    }
                }
            }
            return cursor_moved;
        }

        let under = surfaces
            .under(scene, event.location)
            .and_then(|(view, surface, local)| {
                let client = surfaces.get(surface)?.client();
                Some((
                    Focus {
                        view,
                        surface,
                        client,
                    },
                    local,
                ))
            });
        self.update_focus(under, event.time);
        cursor_moved
    }

    fn update_focus(&mut self, under: Option<(Focus, Point<f64>)>, time: u32) {
        match (self.focus, under) {
            (Some(old), Some((new, local))) if old.view == new.view => {
                for resource in self.resources.iter().filter(|r| r.client() == new.client) {
                    resource.motion(time, local.x, local.y);
                }
            }
            (old, new) => {
                if let Some(old) = old {
                    let serial = self.next_leave_serial();
                    for resource in self.resources.iter().filter(|r| r.client() == old.client) {
                        resource.leave(serial, old.surface);
                    }
                }
                self.focus = new.map(|(focus, _)| focus);
                if let Some((new, local)) = new {
                    let serial = self.next_enter_serial();
                    trace!(view = ?new.view, surface = ?new.surface, "pointer focus changed");
                    for resource in self.resources.iter().filter(|r| r.client() == new.client) {
                        resource.enter(serial, new.surface, local.x, local.y);
                    }
                }
            }
        }
    }

    /// Handle a button event
    ///
    /// The first press grabs the focused view, releasing the last pressed button ends the grab.
    /// Returns the serial sent along with the button event.
    #[instrument(level = "trace", skip(self))]
    pub fn button(&mut self, button: u32, state: ButtonState, time: u32) -> Serial {
        let serial = SERIAL_COUNTER.next_serial();
        match state {
            ButtonState::Pressed => {
                if self.pressed.is_empty() {
                    if let Some(focus) = self.focus {
                        self.grab = Some(focus.view);
                        self.grab_serial = Some(serial);
                        debug!(view = ?focus.view, ?serial, "pointer grab started");
                        self.grab_signal.signal(&PointerGrab { view: self.grab });
                    }
                }
                if !self.pressed.contains(&button) {
                    self.pressed.push(button);
                }
            }
            ButtonState::Released => self.pressed.retain(|b| *b != button),
        }

        if let Some(focus) = self.focus {
            for resource in self.resources.iter().filter(|r| r.client() == focus.client) {
                resource.button(serial, time, button, state);
            }
        }

        if state == ButtonState::Released && self.pressed.is_empty() {
            self.clear_grab();
        }
        serial
    }

    /// End the current grab, if any
    ///
    /// Drops the grab motion callback and announces the release on [`PointerDevice::grab_signal`].
    pub fn clear_grab(&mut self) {
        self.grab_motion = None;
        let had_grab = self.grab.take().is_some();
        self.grab_serial = None;
        if had_grab {
            debug!("pointer grab released");
            self.grab_signal.signal(&PointerGrab { view: None });
        }
    }

    /// Forget every reference to a view that is about to be destroyed
    pub fn forget_view(&mut self, view: ViewId) {
        if self.grab == Some(view) {
            self.clear_grab();
        }
        if self.focus.map(|focus| focus.view) == Some(view) {
            self.focus = None;
        }
    }

    pub(crate) fn move_cursor(&self, scene: &mut Scene) -> bool {
        let Some(cursor) = self.cursor else {
            return false;
        };
        scene.set_position(cursor.view, self.location - cursor.hotspot.to_f64())
    }
}
