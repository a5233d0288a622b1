use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    desktop::{Scene, ViewId},
    input::KeyboardFocusGained,
    protocol::{ClientId, KeyboardHandle},
    utils::{signaling::Signaler, Point, Rectangle, Size, SERIAL_COUNTER},
};

use super::{Region, Role, RoleError};

/// Identifies a [`Surface`]
///
/// Ids are never reused during the lifetime of a [`Surfaces`] store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

impl SurfaceId {
    /// Build an id from its raw protocol value
    pub fn from_raw(id: u32) -> SurfaceId {
        SurfaceId(id)
    }

    /// The raw protocol value
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// A surface stacked relative to a parent surface, at a fixed offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sibling {
    /// The stacked surface
    pub surface: SurfaceId,
    /// Offset from the parent's origin
    pub offset: Point<i32>,
}

/// The keyboard resources focused on a surface
///
/// Shared with focus listeners, which may clear it while the focus is being set.
#[derive(Debug, Clone, Default)]
pub struct KeyboardFocuses(Rc<RefCell<Vec<KeyboardHandle>>>);

impl KeyboardFocuses {
    /// Snapshot of the focused resources
    pub fn handles(&self) -> Vec<KeyboardHandle> {
        self.0.borrow().clone()
    }

    /// Number of focused resources
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether no resource is focused
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub(crate) fn replace(&self, handles: Vec<KeyboardHandle>) {
        *self.0.borrow_mut() = handles;
    }

    pub(crate) fn take(&self) -> Vec<KeyboardHandle> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    /// Send `leave` to every focused resource and clear the set
    ///
    /// Returns the number of resources that were focused.
    pub fn clear(&self, surface: SurfaceId) -> usize {
        let focused = self.take();
        if focused.is_empty() {
            return 0;
        }
        let serial = SERIAL_COUNTER.next_serial();
        for resource in &focused {
            resource.leave(serial, surface);
        }
        trace!(?surface, cleared = focused.len(), "keyboard focus cleared");
        focused.len()
    }
}

/// A client-owned drawable surface
pub struct Surface {
    id: SurfaceId,
    client: ClientId,
    size: Size<i32>,
    input_region: Option<Region>,
    pub(crate) views: Vec<ViewId>,
    keyboard_focuses: KeyboardFocuses,
    keyboard_focus_gained: Signaler<KeyboardFocusGained>,
    siblings: Vec<Sibling>,
    pub(crate) role: Option<Role>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("client", &self.client)
            .field("size", &self.size)
            .field("input_region", &self.input_region)
            .field("views", &self.views)
            .field("keyboard_focuses", &self.keyboard_focuses.len())
            .field("siblings", &self.siblings)
            .field("role", &self.role.as_ref().map(Role::name))
            .finish()
    }
}

impl Surface {
    fn new(id: SurfaceId, client: ClientId, size: Size<i32>) -> Surface {
        Surface {
            id,
            client,
            size,
            input_region: None,
            views: Vec::new(),
            keyboard_focuses: KeyboardFocuses::default(),
            keyboard_focus_gained: Signaler::new(),
            siblings: Vec::new(),
            role: None,
        }
    }

    /// Id of this surface
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Client owning this surface
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Size of the current buffer
    pub fn size(&self) -> Size<i32> {
        self.size
    }

    /// Update the size, as on commit of a new buffer
    pub fn set_size(&mut self, size: Size<i32>) {
        self.size = size;
    }

    /// The input region, `None` meaning the whole surface
    pub fn input_region(&self) -> Option<&Region> {
        self.input_region.as_ref()
    }

    /// Replace the input region
    pub fn set_input_region(&mut self, region: Option<Region>) {
        self.input_region = region;
    }

    /// Views of this surface, in creation order
    pub fn views(&self) -> &[ViewId] {
        &self.views
    }

    /// The keyboard resources focused on this surface
    pub fn keyboard_focuses(&self) -> &KeyboardFocuses {
        &self.keyboard_focuses
    }

    /// Signal emitted whenever this surface gains the keyboard focus
    pub fn keyboard_focus_gained(&self) -> &Signaler<KeyboardFocusGained> {
        &self.keyboard_focus_gained
    }

    /// Surfaces stacked relative to this one
    pub fn siblings(&self) -> &[Sibling] {
        &self.siblings
    }

    /// Register a sibling, replacing any previous relation with the same surface
    pub fn add_sibling(&mut self, sibling: Sibling) {
        self.remove_sibling(sibling.surface);
        self.siblings.push(sibling);
    }

    /// Remove the sibling relation with `surface`
    pub fn remove_sibling(&mut self, surface: SurfaceId) -> bool {
        let before = self.siblings.len();
        self.siblings.retain(|s| s.surface != surface);
        self.siblings.len() != before
    }

    /// The active role
    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    /// Mutable access to the active role
    pub fn role_mut(&mut self) -> Option<&mut Role> {
        self.role.as_mut()
    }

    /// Give this surface a role
    ///
    /// Fails if the surface already holds one, the previous role has to be cleared first. The
    /// rejected role is dropped.
    pub fn set_role(&mut self, role: Role) -> Result<(), RoleError> {
        if let Some(current) = self.role.as_ref() {
            return Err(RoleError::AlreadyHasRole(current.name()));
        }
        self.role = Some(role);
        Ok(())
    }

    /// Remove the role of this surface, returning it
    pub fn take_role(&mut self) -> Option<Role> {
        self.role.take()
    }

    /// Whether a point in surface-local coordinates hits this surface
    pub fn accepts_input(&self, local: Point<f64>) -> bool {
        if matches!(self.role, Some(Role::Cursor(_))) {
            return false;
        }
        if !Rectangle::from_size(self.size.to_f64()).contains(local) {
            return false;
        }
        self.input_region
            .as_ref()
            .map_or(true, |region| region.contains(local.to_i32_trunc()))
    }
}

/// The surfaces known to the compositor, in creation order
#[derive(Debug, Default)]
pub struct Surfaces {
    surfaces: IndexMap<SurfaceId, Surface>,
    next_id: u32,
}

impl Surfaces {
    /// An empty store
    pub fn new() -> Surfaces {
        Surfaces::default()
    }

    /// Create a surface owned by `client`
    pub fn create(&mut self, client: ClientId, size: Size<i32>) -> SurfaceId {
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.surfaces.insert(id, Surface::new(id, client, size));
        id
    }

    /// Access a surface
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    /// Mutable access to a surface
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        self.surfaces.shift_remove(&id)
    }

    /// Iterate over surfaces in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.values_mut()
    }

    /// Number of surfaces
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether there is no surface
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// The front-most view accepting input at a global point
    ///
    /// Returns the view, its surface and the point in surface-local coordinates.
    pub fn under(&self, scene: &Scene, point: Point<f64>) -> Option<(ViewId, SurfaceId, Point<f64>)> {
        scene
            .view_under(point, |view, local| {
                self.get(view.surface())
                    .map_or(false, |surface| surface.accepts_input(local))
            })
            .and_then(|(view, local)| Some((view, scene.view(view)?.surface(), local)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{CursorRole, RectangleKind};

    #[test]
    fn input_region_limits_hits() {
        let mut surfaces = Surfaces::new();
        let id = surfaces.create(ClientId(1), Size::new(100, 100));
        let surface = surfaces.get_mut(id).unwrap();

        assert!(surface.accepts_input(Point::new(50.0, 50.0)));
        assert!(!surface.accepts_input(Point::new(100.0, 50.0)));

        let mut region = Region::new();
        region.add(Rectangle::new(Point::new(0, 0), Size::new(50, 50)), RectangleKind::Add);
        surface.set_input_region(Some(region));
        assert!(surface.accepts_input(Point::new(10.0, 10.0)));
        assert!(!surface.accepts_input(Point::new(60.0, 10.0)));
    }

    #[test]
    fn one_role_at_a_time() {
        let mut surfaces = Surfaces::new();
        let id = surfaces.create(ClientId(1), Size::new(10, 10));
        let surface = surfaces.get_mut(id).unwrap();
        let cursor = || {
            Role::Cursor(CursorRole {
                hotspot: Point::new(0, 0),
            })
        };

        assert!(surface.set_role(cursor()).is_ok());
        assert!(matches!(
            surface.set_role(cursor()),
            Err(RoleError::AlreadyHasRole("cursor"))
        ));
        assert!(!surface.accepts_input(Point::new(1.0, 1.0)));

        assert!(surface.take_role().is_some());
        assert!(surface.set_role(cursor()).is_ok());
    }

    #[test]
    fn siblings_are_unique_per_surface() {
        let mut surfaces = Surfaces::new();
        let parent = surfaces.create(ClientId(1), Size::new(10, 10));
        let child = surfaces.create(ClientId(1), Size::new(10, 10));
        let parent = surfaces.get_mut(parent).unwrap();

        parent.add_sibling(Sibling {
            surface: child,
            offset: Point::new(1, 1),
        });
        parent.add_sibling(Sibling {
            surface: child,
            offset: Point::new(5, 5),
        });

        assert_eq!(parent.siblings().len(), 1);
        assert_eq!(parent.siblings()[0].offset, Point::new(5, 5));
        assert!(parent.remove_sibling(child));
        assert!(!parent.remove_sibling(child));
    }
}
