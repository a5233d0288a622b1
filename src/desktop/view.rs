use std::{cell::Cell, fmt};

use crate::{
    compositor::SurfaceId,
    utils::transform::{self, Mat4},
};

use super::Layer;

/// Handle to a [`SurfaceView`] stored in a [`Scene`](super::Scene)
///
/// Handles of destroyed views never resolve again, even if their slot gets reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId {
    pub(super) index: u32,
    pub(super) generation: u32,
}

/// A positioned, transformed projection of a surface into the scene
///
/// The transform maps view-local coordinates into the coordinate space of the parent view, or
/// into global coordinates for views without parent.
pub struct SurfaceView {
    pub(super) surface: SurfaceId,
    pub(super) transform: Mat4,
    pub(super) parent: Option<ViewId>,
    // in z-order, back to front
    pub(super) children: Vec<ViewId>,
    // only set for root views stacked in a layer
    pub(super) layer: Option<Layer>,
    pub(super) global_cache: Cell<Option<Mat4>>,
    pub(super) inverse_cache: Cell<Option<Option<Mat4>>>,
}

impl fmt::Debug for SurfaceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceView")
            .field("surface", &self.surface)
            .field("translation", &transform::translation_of(&self.transform))
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("layer", &self.layer)
            .finish()
    }
}

impl SurfaceView {
    pub(super) fn new(surface: SurfaceId) -> SurfaceView {
        SurfaceView {
            surface,
            transform: transform::NORMAL,
            parent: None,
            children: Vec::new(),
            layer: None,
            global_cache: Cell::new(None),
            inverse_cache: Cell::new(None),
        }
    }

    /// The surface this view projects
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// The local transform, relative to the parent view
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// The parent view, if any
    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    /// Child views, back to front
    pub fn children(&self) -> &[ViewId] {
        &self.children
    }

    pub(super) fn invalidate(&self) {
        self.global_cache.set(None);
        self.inverse_cache.set(None);
    }
}
