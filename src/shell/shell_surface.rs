use std::{cell::Cell, fmt, rc::Rc, time::Duration};

use calloop::{
    timer::{TimeoutAction, Timer},
    LoopHandle, RegistrationToken,
};
use tracing::{debug, instrument, trace, warn};

use crate::{
    compositor::{Compositor, Sibling, SurfaceId},
    desktop::{Layer, ViewId},
    input::{KeyboardFocusGained, PointerGrab},
    protocol::ShellSurfaceHandle,
    utils::{
        signaling::{SignalToken, Signaler},
        transform, Point, Serial, SERIAL_COUNTER,
    },
};

use super::{
    resize::{self, Quadrant},
    TransientFlags,
};

/// Placement state of a shell surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSurfaceState {
    /// The client did not tell yet how the surface should be shown
    Pending,
    /// A regular window
    TopLevel,
    /// A window stacked above `parent`
    Transient {
        /// The parent surface
        parent: SurfaceId,
        /// Offset from the parent's origin
        offset: Point<i32>,
        /// Transient flags
        flags: TransientFlags,
    },
    /// A popup menu stacked above `parent`
    Popup {
        /// The parent surface
        parent: SurfaceId,
        /// Offset from the parent's origin
        offset: Point<i32>,
    },
}

struct Listener<E> {
    signaler: Signaler<E>,
    token: SignalToken,
}

impl<E> Listener<E> {
    fn disconnect(self) {
        self.signaler.disconnect(self.token);
    }
}

/// The shell surface role
///
/// Turns a surface into an interactive window: liveness checking through ping/pong, interactive
/// move and resize driven by pointer grabs, top-level and transient placement.
///
/// Requests racing with the compositor state (stale pong serials, move or resize without the
/// matching grab) are ignored.
pub struct ShellSurface {
    surface: SurfaceId,
    view: ViewId,
    resource: ShellSurfaceHandle,
    state: ShellSurfaceState,
    ping_serial: Serial,
    active: bool,
    title: Option<String>,
    class: Option<String>,
    ping_timeout: Duration,
    timer: Option<RegistrationToken>,
    loop_handle: LoopHandle<'static, Compositor>,
    focus_listener: Option<Listener<KeyboardFocusGained>>,
    resize_watcher: Option<Listener<PointerGrab>>,
}

impl fmt::Debug for ShellSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSurface")
            .field("surface", &self.surface)
            .field("view", &self.view)
            .field("resource", &self.resource)
            .field("state", &self.state)
            .field("ping_serial", &self.ping_serial)
            .field("active", &self.active)
            .field("title", &self.title)
            .field("class", &self.class)
            .field("timer", &self.timer)
            .field("focus_listener", &self.focus_listener.as_ref().map(|l| l.token))
            .field("resize_watcher", &self.resize_watcher.as_ref().map(|l| l.token))
            .finish()
    }
}

impl ShellSurface {
    pub(super) fn new(
        surface: SurfaceId,
        view: ViewId,
        resource: ShellSurfaceHandle,
        ping_timeout: Duration,
        loop_handle: LoopHandle<'static, Compositor>,
    ) -> ShellSurface {
        ShellSurface {
            surface,
            view,
            resource,
            state: ShellSurfaceState::Pending,
            ping_serial: SERIAL_COUNTER.next_serial(),
            active: true,
            title: None,
            class: None,
            ping_timeout,
            timer: None,
            loop_handle,
            focus_listener: None,
            resize_watcher: None,
        }
    }

    /// The surface holding this role
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// The view of the surface
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// The protocol resource
    pub fn resource(&self) -> &ShellSurfaceHandle {
        &self.resource
    }

    /// Current placement state
    pub fn state(&self) -> ShellSurfaceState {
        self.state
    }

    /// Parent surface of a transient or popup
    pub fn parent(&self) -> Option<SurfaceId> {
        match self.state {
            ShellSurfaceState::Transient { parent, .. } | ShellSurfaceState::Popup { parent, .. } => {
                Some(parent)
            }
            _ => None,
        }
    }

    /// Serial of the last ping sent to the client
    pub fn ping_serial(&self) -> Serial {
        self.ping_serial
    }

    /// Whether the client answered the last ping in time
    ///
    /// A new shell surface counts as active until its first ping goes unanswered.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Window title
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Window class
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Token of the armed liveness timer, if any
    pub fn liveness_timer(&self) -> Option<RegistrationToken> {
        self.timer
    }

    /// Whether keyboard focus is suppressed for this surface
    pub fn suppresses_keyboard_focus(&self) -> bool {
        self.focus_listener.is_some()
    }

    pub(super) fn ping(&mut self) {
        self.ping_serial = SERIAL_COUNTER.next_serial();
        self.resource.ping(self.ping_serial);
        self.arm_liveness_timer();
    }

    /// Handle a pong from the client
    ///
    /// Only an answer to the last ping counts: it marks the surface active, sends the next ping and
    /// re-arms the liveness timer. Other serials are ignored.
    #[instrument(level = "trace", skip(self), fields(surface = ?self.surface))]
    pub fn pong(&mut self, serial: Serial) {
        if serial != self.ping_serial {
            debug!(?serial, expected = ?self.ping_serial, "ignoring stale pong");
            return;
        }
        self.active = true;
        self.ping();
    }

    fn arm_liveness_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            self.loop_handle.remove(token);
        }

        let surface = self.surface;
        let token = self.loop_handle.insert_source(
            Timer::from_duration(self.ping_timeout),
            move |_, _, state: &mut Compositor| {
                if let Some(shell_surface) = state.shell_surface_mut(surface) {
                    shell_surface.liveness_timeout();
                }
                TimeoutAction::Drop
            },
        );
        match token {
            Ok(token) => self.timer = Some(token),
            Err(err) => warn!(surface = ?self.surface, "failed to arm liveness timer: {}", err.error),
        }
    }

    fn liveness_timeout(&mut self) {
        self.timer = None;
        if self.active {
            debug!(surface = ?self.surface, "client did not answer ping in time");
        }
        self.active = false;
    }

    /// Start an interactive move
    ///
    /// Only proceeds if the pointer grab identified by `serial` is held on a view of this surface.
    /// The grabbed view then follows the pointer, keeping the offset it had when the grab started.
    #[instrument(level = "debug", skip(self, compositor), fields(surface = ?self.surface))]
    pub fn interactive_move(&mut self, compositor: &mut Compositor, serial: Serial) {
        let Some(view) = self.grabbed_view(compositor) else {
            debug!("move requested without a grab on this surface");
            return;
        };
        let Some(origin) = compositor.scene.position(view) else {
            return;
        };
        let offset = compositor.seat.pointer.position() - origin;

        let installed = compositor.seat.pointer.grab_motion(serial, move |scene, event| {
            scene.set_position(view, event.location - offset);
        });
        if installed {
            trace!(?view, "interactive move started");
        }
    }

    /// Start an interactive resize
    ///
    /// Only proceeds if the pointer grab identified by `serial` is held on a view of this surface.
    /// While the grab lasts, every motion sends a configure event with the size derived from the
    /// pointer location. The client's pointers leave the surface for the duration of the resize and
    /// enter it again, at the location the resize started from, once the grab is released.
    #[instrument(level = "debug", skip(self, compositor), fields(surface = ?self.surface))]
    pub fn interactive_resize(&mut self, compositor: &mut Compositor, serial: Serial, edges: u32) {
        let Some(view) = self.grabbed_view(compositor) else {
            debug!("resize requested without a grab on this surface");
            return;
        };
        let (Some(inverse), Some(target)) = (
            compositor.scene.inverse_transform(view),
            compositor.surfaces.get(self.surface),
        ) else {
            return;
        };
        let client = target.client();
        let start = compositor.seat.pointer.position().transform(&inverse);
        let quadrant = Quadrant::from_edges(edges);
        let resize_transform = quadrant.transform(start, target.size().to_f64());

        let resource = self.resource.clone();
        let installed = compositor.seat.pointer.grab_motion(serial, move |_, event| {
            let local = event.location.transform(&inverse);
            let size = resize::resized(&resize_transform, local);
            resource.configure(quadrant.edges(), size.w, size.h);
        });
        if !installed {
            return;
        }
        debug!(?quadrant, "interactive resize started");

        // the request names the seat, not a pointer: every pointer of the client leaves. The release
        // ending the grab still reaches the client, it is delivered before the watcher sends enter.
        let pointers = compositor.seat.pointer.resources_of(client);
        let leave_serial = compositor.seat.pointer.next_leave_serial();
        for pointer in &pointers {
            pointer.leave(leave_serial, self.surface);
        }

        self.disconnect_resize_watcher();
        let signal = compositor.seat.pointer.grab_signal().clone();
        let handle = signal.clone();
        let surface = self.surface;
        let own_token = Rc::new(Cell::new(None));
        let token = signal.connect({
            let own_token = own_token.clone();
            move |grab: &PointerGrab| {
                if grab.view.is_some() {
                    return;
                }
                let serial = SERIAL_COUNTER.next_serial();
                for pointer in &pointers {
                    pointer.enter(serial, surface, start.x, start.y);
                }
                if let Some(token) = own_token.take() {
                    handle.disconnect(token);
                }
            }
        });
        own_token.set(Some(token));
        self.resize_watcher = Some(Listener { signaler: signal, token });
    }

    fn grabbed_view(&self, compositor: &Compositor) -> Option<ViewId> {
        let view = compositor.seat.pointer.grab()?;
        let owner = compositor.scene.view(view)?.surface();
        (owner == self.surface).then_some(view)
    }

    /// Show the surface as a regular window
    ///
    /// Any transient relation is dropped and the view is raised to the front of the application
    /// layer.
    #[instrument(level = "debug", skip(self, compositor), fields(surface = ?self.surface))]
    pub fn set_top_level(&mut self, compositor: &mut Compositor) {
        self.leave_parent(compositor);
        self.disconnect_focus_listener();
        compositor.scene.add_view(self.view, Layer::Application);
        self.state = ShellSurfaceState::TopLevel;
        compositor.request_render();
    }

    /// Show the surface stacked above `parent`, at `offset` from its origin
    ///
    /// With [`TransientFlags::INACTIVE`] the surface never keeps the keyboard focus: focused
    /// keyboards receive `leave` right away and whenever the focus comes back.
    #[instrument(level = "debug", skip(self, compositor), fields(surface = ?self.surface))]
    pub fn set_transient(
        &mut self,
        compositor: &mut Compositor,
        parent: SurfaceId,
        offset: Point<i32>,
        flags: TransientFlags,
    ) {
        self.disconnect_focus_listener();
        if flags.contains(TransientFlags::INACTIVE) {
            if let Some(target) = compositor.surfaces.get(self.surface) {
                let focuses = target.keyboard_focuses().clone();
                let surface = self.surface;
                focuses.clear(surface);
                let signaler = target.keyboard_focus_gained().clone();
                let token = signaler.connect(move |_| {
                    focuses.clear(surface);
                });
                self.focus_listener = Some(Listener { signaler, token });
            }
        }

        if !self.attach_to(compositor, parent, offset) {
            return;
        }

        self.state = ShellSurfaceState::Transient { parent, offset, flags };
        compositor.request_render();
    }

    /// Show the surface as a popup above `parent`, at `offset` from its origin
    #[instrument(level = "debug", skip(self, compositor), fields(surface = ?self.surface))]
    pub fn set_popup(&mut self, compositor: &mut Compositor, parent: SurfaceId, offset: Point<i32>) {
        if !self.attach_to(compositor, parent, offset) {
            return;
        }
        self.disconnect_focus_listener();
        self.state = ShellSurfaceState::Popup { parent, offset };
        compositor.request_render();
    }

    fn attach_to(&mut self, compositor: &mut Compositor, parent: SurfaceId, offset: Point<i32>) -> bool {
        if parent == self.surface {
            debug!("surface cannot be its own parent");
            return false;
        }
        let Some(parent_view) = compositor
            .surfaces
            .get(parent)
            .and_then(|p| p.views().last().copied())
        else {
            debug!(?parent, "parent surface has no view");
            return false;
        };

        let local = transform::translation(offset.x as f64, offset.y as f64);
        if !compositor
            .scene
            .set_parent_with_transform(self.view, parent_view, local)
        {
            return false;
        }

        self.leave_parent(compositor);
        if let Some(parent) = compositor.surfaces.get_mut(parent) {
            parent.add_sibling(Sibling {
                surface: self.surface,
                offset,
            });
        }
        true
    }

    fn leave_parent(&mut self, compositor: &mut Compositor) {
        if let Some(parent) = self.parent().and_then(|p| compositor.surfaces.get_mut(p)) {
            parent.remove_sibling(self.surface);
        }
    }

    fn disconnect_focus_listener(&mut self) {
        if let Some(listener) = self.focus_listener.take() {
            listener.disconnect();
        }
    }

    fn disconnect_resize_watcher(&mut self) {
        if let Some(watcher) = self.resize_watcher.take() {
            watcher.disconnect();
        }
    }

    /// Set the window title
    pub fn set_title(&mut self, compositor: &mut Compositor, title: String) {
        self.title = Some(title);
        compositor.request_render();
    }

    /// Set the window class
    pub fn set_class(&mut self, compositor: &mut Compositor, class: String) {
        self.class = Some(class);
        compositor.request_render();
    }
}

impl Drop for ShellSurface {
    fn drop(&mut self) {
        if let Some(token) = self.timer.take() {
            self.loop_handle.remove(token);
        }
        self.disconnect_focus_listener();
        self.disconnect_resize_watcher();
    }
}
