//! Shell surfaces
//!
//! This module implements the logic of the `wl_shell` protocol: a surface given the shell surface
//! role becomes a window the user can move and resize, shown either as a regular top-level window,
//! as a transient stacked above a parent window, or as a popup.
//!
//! The protocol layer forwards requests with [`Compositor::get_shell_surface`] and
//! [`Compositor::shell_surface_request`]:
//!
//! ```no_run
//! # use std::rc::Rc;
//! # use calloop::EventLoop;
//! # use compositor_core::{
//! #     compositor::{Compositor, CompositorConfig},
//! #     protocol::{ClientId, ShellSurfaceHandle},
//! #     shell::Request,
//! #     utils::Size,
//! # };
//! # fn resource() -> ShellSurfaceHandle { unimplemented!() }
//! let mut event_loop = EventLoop::<Compositor>::try_new().unwrap();
//! let mut state = Compositor::new(event_loop.handle(), CompositorConfig::default());
//! let surface = state.create_surface(ClientId(1), Size::new(640, 480));
//!
//! // wl_shell.get_shell_surface
//! state.get_shell_surface(surface, resource()).unwrap();
//! // wl_shell_surface.set_toplevel
//! state.shell_surface_request(surface, Request::SetTopLevel);
//! ```

use std::time::Duration;

use tracing::{debug, trace};

use crate::{
    compositor::{Compositor, Role, RoleError, SurfaceId},
    protocol::ShellSurfaceHandle,
    utils::{Point, Serial},
};

mod resize;
mod shell_surface;

pub use self::resize::{resized, Quadrant};
pub use self::shell_surface::{ShellSurface, ShellSurfaceState};

/// Shell configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellConfig {
    /// Delay after which a client that did not answer a ping is considered inactive
    pub ping_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            ping_timeout: Duration::from_millis(5000),
        }
    }
}

/// Errors of the shell
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The surface already holds another role
    #[error(transparent)]
    Role(#[from] RoleError),
    /// The surface does not exist
    #[error("unknown surface {0:?}")]
    UnknownSurface(SurfaceId),
}

bitflags::bitflags! {
    /// Edges of a surface being resized
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResizeEdge: u32 {
        /// Top edge
        const TOP = 1;
        /// Bottom edge
        const BOTTOM = 2;
        /// Left edge
        const LEFT = 4;
        /// Top and left edges
        const TOP_LEFT = 5;
        /// Bottom and left edges
        const BOTTOM_LEFT = 6;
        /// Right edge
        const RIGHT = 8;
        /// Top and right edges
        const TOP_RIGHT = 9;
        /// Bottom and right edges
        const BOTTOM_RIGHT = 10;
    }
}

bitflags::bitflags! {
    /// Details of a transient surface
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransientFlags: u32 {
        /// The surface never takes the keyboard focus
        const INACTIVE = 1;
    }
}

/// Requests of a client on its shell surface
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Answer to a ping
    Pong {
        /// Serial of the ping
        serial: Serial,
    },
    /// Start an interactive move
    Move {
        /// Serial of the button press that started the grab
        serial: Serial,
    },
    /// Start an interactive resize
    Resize {
        /// Serial of the button press that started the grab
        serial: Serial,
        /// Raw edges, see [`ResizeEdge`]
        edges: u32,
    },
    /// Show as a regular window
    SetTopLevel,
    /// Show stacked above another surface
    SetTransient {
        /// The parent surface
        parent: SurfaceId,
        /// Horizontal offset from the parent's origin
        x: i32,
        /// Vertical offset from the parent's origin
        y: i32,
        /// Transient flags
        flags: TransientFlags,
    },
    /// Show as a popup above another surface
    SetPopup {
        /// The parent surface
        parent: SurfaceId,
        /// Horizontal offset from the parent's origin
        x: i32,
        /// Vertical offset from the parent's origin
        y: i32,
    },
    /// Show fullscreen
    SetFullscreen,
    /// Show maximized
    SetMaximized,
    /// Set the window title
    SetTitle(String),
    /// Set the window class
    SetClass(String),
}

impl Compositor {
    /// Give `surface` the shell surface role
    ///
    /// Creates the view of the surface, sends the first ping and arms the liveness timer. The view is
    /// only shown once the client chose how, see [`Request`].
    pub fn get_shell_surface(
        &mut self,
        surface: SurfaceId,
        resource: ShellSurfaceHandle,
    ) -> Result<(), ShellError> {
        let target = self
            .surfaces
            .get(surface)
            .ok_or(ShellError::UnknownSurface(surface))?;
        if let Some(role) = target.role() {
            return Err(RoleError::AlreadyHasRole(role.name()).into());
        }

        let view = self
            .create_view(surface)
            .ok_or(ShellError::UnknownSurface(surface))?;
        let mut shell_surface = ShellSurface::new(
            surface,
            view,
            resource,
            self.config().shell.ping_timeout,
            self.loop_handle().clone(),
        );
        shell_surface.ping();

        self.surfaces
            .get_mut(surface)
            .ok_or(ShellError::UnknownSurface(surface))?
            .set_role(Role::ShellSurface(shell_surface))?;
        debug!(?surface, ?view, "shell surface created");
        Ok(())
    }

    /// Handle a request on the shell surface of `surface`
    ///
    /// Returns `false` if the surface holds no shell surface role.
    pub fn shell_surface_request(&mut self, surface: SurfaceId, request: Request) -> bool {
        self.with_shell_surface(surface, |shell_surface, compositor| match request {
            Request::Pong { serial } => shell_surface.pong(serial),
            Request::Move { serial } => shell_surface.interactive_move(compositor, serial),
            Request::Resize { serial, edges } => {
                shell_surface.interactive_resize(compositor, serial, edges)
            }
            Request::SetTopLevel => shell_surface.set_top_level(compositor),
            Request::SetTransient { parent, x, y, flags } => {
                shell_surface.set_transient(compositor, parent, Point::new(x, y), flags)
            }
            Request::SetPopup { parent, x, y } => {
                shell_surface.set_popup(compositor, parent, Point::new(x, y))
            }
            Request::SetFullscreen | Request::SetMaximized => {
                trace!(?surface, "ignoring fullscreen/maximized request");
            }
            Request::SetTitle(title) => shell_surface.set_title(compositor, title),
            Request::SetClass(class) => shell_surface.set_class(compositor, class),
        })
        .is_some()
    }
}
