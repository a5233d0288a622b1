use crate::{shell::ShellSurface, utils::Point};

/// Error returned when giving a role to a surface
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    /// The surface already holds a role
    #[error("surface already has the {0} role")]
    AlreadyHasRole(&'static str),
}

/// Role of a surface used as the pointer image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRole {
    /// Offset of the hotspot from the surface origin
    pub hotspot: Point<i32>,
}

/// Behavior bound to a surface
///
/// A surface holds at most one role at a time.
#[derive(Debug)]
pub enum Role {
    /// A desktop window, see [`ShellSurface`]
    ShellSurface(ShellSurface),
    /// The pointer image
    Cursor(CursorRole),
}

/// Dispatch on the variant of a [`Role`]
pub trait RoleVisitor {
    /// Value produced by the visit
    type Output;
    /// The role is a shell surface
    fn visit_shell_surface(&mut self, shell_surface: &ShellSurface) -> Self::Output;
    /// The role is a cursor
    fn visit_cursor(&mut self, cursor: &CursorRole) -> Self::Output;
}

impl Role {
    /// Name of the role, as used in protocol errors
    pub fn name(&self) -> &'static str {
        match self {
            Role::ShellSurface(_) => "wl_shell_surface",
            Role::Cursor(_) => "cursor",
        }
    }

    /// Visit this role
    pub fn accept<V: RoleVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Role::ShellSurface(shell_surface) => visitor.visit_shell_surface(shell_surface),
            Role::Cursor(cursor) => visitor.visit_cursor(cursor),
        }
    }

    /// The shell surface state, if this is a shell surface
    pub fn as_shell_surface(&self) -> Option<&ShellSurface> {
        match self {
            Role::ShellSurface(shell_surface) => Some(shell_surface),
            _ => None,
        }
    }

    /// Mutable access to the shell surface state, if this is a shell surface
    pub fn as_shell_surface_mut(&mut self) -> Option<&mut ShellSurface> {
        match self {
            Role::ShellSurface(shell_surface) => Some(shell_surface),
            _ => None,
        }
    }
}
