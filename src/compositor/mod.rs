//! Surfaces, roles and the compositor state
//!
//! The [`Compositor`] is the single-threaded core state. It is meant to be the shared data of the
//! [`calloop`] event loop driving the compositor, so every callback (timers, idle renders, jobs
//! returning from other threads) gets mutable access to it.
//!
//! ```no_run
//! use calloop::EventLoop;
//! use compositor_core::{
//!     compositor::{Compositor, CompositorConfig},
//!     protocol::ClientId,
//!     utils::Size,
//! };
//!
//! let mut event_loop = EventLoop::<Compositor>::try_new().unwrap();
//! let mut state = Compositor::new(event_loop.handle(), CompositorConfig::default());
//!
//! let surface = state.create_surface(ClientId(1), Size::new(640, 480));
//! // protocol requests are forwarded to `state` here...
//!
//! event_loop.dispatch(None, &mut state).unwrap();
//! # let _ = surface;
//! ```

use std::fmt;

use calloop::LoopHandle;
use tracing::{debug, trace};

use crate::{
    backend::Renderer,
    desktop::{Layer, Scene, ViewId},
    input::{ButtonState, Cursor, KeyState, MotionEvent, Seat},
    protocol::ClientId,
    shell::{ShellConfig, ShellSurface},
    utils::{Point, Serial, Size},
};

mod region;
mod role;
mod surface;

pub use self::region::{Region, RectangleKind};
pub use self::role::{CursorRole, Role, RoleError, RoleVisitor};
pub use self::surface::{KeyboardFocuses, Sibling, Surface, SurfaceId, Surfaces};

/// Configuration of the compositor core
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Name of the seat
    pub seat_name: String,
    /// Shell surface settings
    pub shell: ShellConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        CompositorConfig {
            seat_name: "seat0".into(),
            shell: ShellConfig::default(),
        }
    }
}

/// The compositor core state
pub struct Compositor {
    /// Every surface of every client
    pub surfaces: Surfaces,
    /// The scene graph
    pub scene: Scene,
    /// The input devices
    pub seat: Seat,
    config: CompositorConfig,
    loop_handle: LoopHandle<'static, Compositor>,
    renderer: Option<Box<dyn Renderer>>,
    render_pending: bool,
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("surfaces", &self.surfaces)
            .field("scene", &self.scene)
            .field("seat", &self.seat)
            .field("config", &self.config)
            .field("renderer", &self.renderer.is_some())
            .field("render_pending", &self.render_pending)
            .finish()
    }
}

impl Compositor {
    /// Create the compositor state
    ///
    /// `loop_handle` must belong to the event loop this state will be dispatched with.
    pub fn new(loop_handle: LoopHandle<'static, Compositor>, config: CompositorConfig) -> Compositor {
        Compositor {
            surfaces: Surfaces::new(),
            scene: Scene::new(),
            seat: Seat::new(config.seat_name.clone()),
            config,
            loop_handle,
            renderer: None,
            render_pending: false,
        }
    }

    /// The configuration this state was created with
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Handle to the event loop
    pub fn loop_handle(&self) -> &LoopHandle<'static, Compositor> {
        &self.loop_handle
    }

    /// Install the renderer, returning the previous one
    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) -> Option<Box<dyn Renderer>> {
        self.renderer.replace(renderer)
    }

    /// Create a surface for `client`
    pub fn create_surface(&mut self, client: ClientId, size: Size<i32>) -> SurfaceId {
        let id = self.surfaces.create(client, size);
        debug!(surface = ?id, ?client, "surface created");
        id
    }

    /// Destroy a surface, its role and its views
    pub fn destroy_surface(&mut self, surface: SurfaceId) -> bool {
        if self.surfaces.get(surface).is_none() {
            return false;
        }
        self.clear_role(surface);
        self.destroy_views(surface);
        self.seat.keyboard.forget_surface(surface);
        for other in self.surfaces.iter_mut() {
            other.remove_sibling(surface);
        }
        self.surfaces.remove(surface);
        debug!(?surface, "surface destroyed");
        self.request_render();
        true
    }

    /// Create a new view of `surface`, not stacked yet
    pub fn create_view(&mut self, surface: SurfaceId) -> Option<ViewId> {
        let target = self.surfaces.get_mut(surface)?;
        let view = self.scene.create_view(surface);
        target.views.push(view);
        Some(view)
    }

    fn destroy_views(&mut self, surface: SurfaceId) {
        let Some(target) = self.surfaces.get_mut(surface) else {
            return;
        };
        for view in std::mem::take(&mut target.views) {
            self.seat.pointer.forget_view(view);
            self.scene.destroy_view(view);
        }
    }

    /// Remove the role of a surface
    ///
    /// The views of the surface are destroyed and any timer owned by the role is cancelled.
    pub fn clear_role(&mut self, surface: SurfaceId) -> bool {
        let Some(role) = self.surfaces.get_mut(surface).and_then(Surface::take_role) else {
            return false;
        };
        match &role {
            Role::ShellSurface(shell_surface) => {
                if let Some(parent) = shell_surface.parent().and_then(|p| self.surfaces.get_mut(p)) {
                    parent.remove_sibling(surface);
                }
            }
            Role::Cursor(_) => {
                if self.seat.pointer.cursor().map(|c| c.surface) == Some(surface) {
                    self.seat.pointer.replace_cursor(None);
                }
            }
        }
        debug!(?surface, role = role.name(), "role cleared");
        // timers and listeners of the role go first, destroying the views may release a grab
        drop(role);
        self.destroy_views(surface);
        self.request_render();
        true
    }

    /// Run `f` with the shell surface role of `surface`
    ///
    /// The role is taken out of the surface for the duration of the call, so `f` has mutable access
    /// to the rest of the state. Returns `None` if the surface holds no shell surface role.
    pub fn with_shell_surface<T, F>(&mut self, surface: SurfaceId, f: F) -> Option<T>
    where
        F: FnOnce(&mut ShellSurface, &mut Compositor) -> T,
    {
        let target = self.surfaces.get_mut(surface)?;
        let mut role = match target.take_role()? {
            Role::ShellSurface(shell_surface) => shell_surface,
            other => {
                target.role = Some(other);
                return None;
            }
        };
        let result = f(&mut role, self);
        if let Some(target) = self.surfaces.get_mut(surface) {
            target.role = Some(Role::ShellSurface(role));
        }
        Some(result)
    }

    /// The shell surface role of `surface`
    pub fn shell_surface(&self, surface: SurfaceId) -> Option<&ShellSurface> {
        self.surfaces.get(surface)?.role()?.as_shell_surface()
    }

    /// Mutable access to the shell surface role of `surface`
    pub fn shell_surface_mut(&mut self, surface: SurfaceId) -> Option<&mut ShellSurface> {
        self.surfaces.get_mut(surface)?.role_mut()?.as_shell_surface_mut()
    }

    /// The surface accepting input at a global point, and the point in surface-local coordinates
    pub fn surface_under(&self, point: Point<f64>) -> Option<(SurfaceId, Point<f64>)> {
        self.surfaces
            .under(&self.scene, point)
            .map(|(_, surface, local)| (surface, local))
    }

    /// Make `surface` the pointer image, or hide the cursor
    ///
    /// The surface gets the cursor role, its view is stacked in the overlay layer and follows the
    /// pointer from then on. The previous cursor surface loses its role.
    pub fn set_cursor(&mut self, cursor: Option<(SurfaceId, Point<i32>)>) -> Result<(), RoleError> {
        let previous = self.seat.pointer.cursor();

        if let Some((surface, hotspot)) = cursor {
            if let Some(previous) = previous.filter(|c| c.surface == surface) {
                if let Some(Role::Cursor(role)) = self.surfaces.get_mut(surface).and_then(Surface::role_mut) {
                    role.hotspot = hotspot;
                }
                self.seat
                    .pointer
                    .replace_cursor(Some(Cursor { hotspot, ..previous }));
                self.seat.pointer.move_cursor(&mut self.scene);
                self.request_render();
                return Ok(());
            }
            let Some(target) = self.surfaces.get_mut(surface) else {
                debug!(?surface, "cursor surface does not exist");
                return Ok(());
            };
            target.set_role(Role::Cursor(CursorRole { hotspot }))?;
        }

        if let Some(previous) = previous {
            self.clear_role(previous.surface);
        }

        if let Some((surface, hotspot)) = cursor {
            if let Some(view) = self.create_view(surface) {
                self.scene.add_view(view, Layer::Overlay);
                self.seat.pointer.replace_cursor(Some(Cursor {
                    surface,
                    view,
                    hotspot,
                }));
                self.seat.pointer.move_cursor(&mut self.scene);
            }
        }
        self.request_render();
        Ok(())
    }

    /// Forward a pointer motion to the seat
    pub fn pointer_motion(&mut self, location: Point<f64>, time: u32) {
        let event = MotionEvent { location, time };
        if self.seat.pointer.motion(&mut self.scene, &self.surfaces, &event) {
            self.request_render();
        }
    }

    /// Forward a pointer button to the seat, returns the serial of the event
    pub fn pointer_button(&mut self, button: u32, state: ButtonState, time: u32) -> Serial {
        self.seat.pointer.button(button, state, time)
    }

    /// Forward a key to the seat, returns the serial of the event
    pub fn keyboard_key(&mut self, key: u32, state: KeyState, time: u32) -> Serial {
        self.seat.keyboard.key(&self.surfaces, key, state, time)
    }

    /// Move the keyboard focus
    pub fn set_keyboard_focus(&mut self, surface: Option<SurfaceId>) {
        self.seat.keyboard.set_focus(&self.surfaces, surface);
    }

    /// Ask for a new frame
    ///
    /// Requests are coalesced: the frame is rendered once, when the event loop becomes idle.
    pub fn request_render(&mut self) {
        if self.render_pending {
            return;
        }
        self.render_pending = true;
        self.loop_handle.insert_idle(|state: &mut Compositor| state.render());
    }

    /// Whether a frame was requested and not rendered yet
    pub fn render_pending(&self) -> bool {
        self.render_pending
    }

    /// Render the scene on every output
    ///
    /// Without renderer or outputs there is nothing to composite, the call does nothing.
    pub fn render(&mut self) {
        self.render_pending = false;
        let Some(renderer) = self.renderer.as_mut() else {
            trace!("no renderer, skipping frame");
            return;
        };
        if renderer.outputs().is_empty() {
            trace!("no outputs, skipping frame");
            return;
        }
        renderer.render(&self.scene, &self.surfaces);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc, time::Duration};

    use calloop::EventLoop;

    use super::*;
    use crate::{
        backend::Output,
        utils::{Rectangle, Size},
    };

    #[derive(Debug)]
    struct CountingRenderer {
        outputs: Vec<Output>,
        frames: Rc<Cell<usize>>,
    }

    impl Renderer for CountingRenderer {
        fn outputs(&self) -> &[Output] {
            &self.outputs
        }

        fn render(&mut self, _scene: &Scene, _surfaces: &Surfaces) {
            self.frames.set(self.frames.get() + 1);
        }
    }

    fn setup() -> (EventLoop<'static, Compositor>, Compositor) {
        let event_loop = EventLoop::try_new().unwrap();
        let state = Compositor::new(event_loop.handle(), CompositorConfig::default());
        (event_loop, state)
    }

    fn with_renderer(state: &mut Compositor, outputs: usize) -> Rc<Cell<usize>> {
        let frames = Rc::new(Cell::new(0));
        let outputs = (0..outputs)
            .map(|i| Output {
                name: format!("output-{i}"),
                geometry: Rectangle::from_size(Size::new(1920, 1080)),
            })
            .collect();
        state.set_renderer(Box::new(CountingRenderer {
            outputs,
            frames: frames.clone(),
        }));
        frames
    }

    #[test]
    fn render_requests_are_coalesced() {
        let (mut event_loop, mut state) = setup();
        let frames = with_renderer(&mut state, 1);

        state.request_render();
        state.request_render();
        assert!(state.render_pending());
        event_loop.dispatch(Some(Duration::ZERO), &mut state).unwrap();

        assert_eq!(frames.get(), 1);
        assert!(!state.render_pending());
    }

    #[test]
    fn nothing_to_composite_without_outputs() {
        let (mut event_loop, mut state) = setup();
        let frames = with_renderer(&mut state, 0);

        state.request_render();
        event_loop.dispatch(Some(Duration::ZERO), &mut state).unwrap();

        assert_eq!(frames.get(), 0);
    }

    #[test]
    fn cursor_follows_the_pointer_and_is_never_hit() {
        let (_event_loop, mut state) = setup();
        let window = state.create_surface(ClientId(1), Size::new(100, 100));
        let view = state.create_view(window).unwrap();
        state.scene.add_view(view, Layer::Application);
        let cursor = state.create_surface(ClientId(1), Size::new(16, 16));

        state.set_cursor(Some((cursor, Point::new(2, 2)))).unwrap();
        state.pointer_motion(Point::new(50.0, 50.0), 0);

        let cursor_view = state.seat.pointer.cursor().unwrap().view;
        assert_eq!(state.scene.position(cursor_view), Some(Point::new(48.0, 48.0)));
        assert_eq!(state.scene.layer_of(cursor_view), Some(Layer::Overlay));
        assert_eq!(state.surface_under(Point::new(50.0, 50.0)).map(|(s, _)| s), Some(window));

        state.set_cursor(None).unwrap();
        assert!(state.seat.pointer.cursor().is_none());
        assert!(state.surfaces.get(cursor).unwrap().role().is_none());
        assert!(state.scene.view(cursor_view).is_none());
    }

    #[test]
    fn destroying_a_surface_cleans_up() {
        let (_event_loop, mut state) = setup();
        let parent = state.create_surface(ClientId(1), Size::new(100, 100));
        let child = state.create_surface(ClientId(1), Size::new(10, 10));
        let view = state.create_view(child).unwrap();
        state.scene.add_view(view, Layer::Application);
        state.surfaces.get_mut(parent).unwrap().add_sibling(Sibling {
            surface: child,
            offset: Point::new(1, 1),
        });
        state.set_keyboard_focus(Some(child));

        assert!(state.destroy_surface(child));

        assert!(state.surfaces.get(child).is_none());
        assert!(state.scene.view(view).is_none());
        assert!(state.surfaces.get(parent).unwrap().siblings().is_empty());
        assert_eq!(state.seat.keyboard.focus(), None);
        assert!(!state.destroy_surface(child));
    }
}
