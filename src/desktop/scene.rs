use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::{
    compositor::SurfaceId,
    utils::{
        transform::{self, Mat4},
        Point,
    },
};

use super::{SurfaceView, ViewId};

/// Stacking bands of the scene, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    /// Wallpapers and the like
    Background,
    /// Regular client windows
    Application,
    /// Cursors, always drawn on top
    Overlay,
}

impl Layer {
    /// All layers, back to front
    pub const ALL: [Layer; 3] = [Layer::Background, Layer::Application, Layer::Overlay];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    view: Option<SurfaceView>,
}

/// The ordered set of surface views that rendering and hit-testing walk
///
/// The scene owns every [`SurfaceView`], callers refer to them through [`ViewId`]s. Root views are
/// stacked in one of the [`Layer`]s, child views are stacked directly above their parent, in the
/// order they were attached. Views that are neither stacked nor attached to a stacked view exist but
/// are not part of the scene: they are not drawn and never hit.
#[derive(Debug, Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    // in z-order, back to front
    layers: [IndexSet<ViewId>; 3],
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Scene {
        Scene::default()
    }

    /// Create a new view of `surface`
    ///
    /// The view starts with an identity transform and is not stacked yet, see [`Scene::add_view`].
    pub fn create_view(&mut self, surface: SurfaceId) -> ViewId {
        let view = SurfaceView::new(surface);
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.view = Some(view);
            ViewId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                view: Some(view),
            });
            ViewId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        };
        trace!(?id, ?surface, "view created");
        id
    }

    /// Destroy a view
    ///
    /// Children of the view are detached and keep their global position. They become root views
    /// taking the place of the destroyed view in its layer, or the place directly above its root
    /// ancestor if the destroyed view was itself a child.
    pub fn destroy_view(&mut self, id: ViewId) -> bool {
        let Some(view) = self.view(id) else {
            return false;
        };
        let children = view.children.clone();

        let globals: Vec<(ViewId, Mat4)> = children
            .iter()
            .filter_map(|child| Some((*child, self.global_transform(*child)?)))
            .collect();

        let placement = match view.layer {
            Some(layer) => self.layers[layer.index()]
                .get_index_of(&id)
                .map(|index| (layer, index)),
            None => self.root_of(id).and_then(|root| {
                let layer = self.view(root)?.layer?;
                let index = self.layers[layer.index()].get_index_of(&root)?;
                Some((layer, index + 1))
            }),
        };

        self.unstack(id);
        self.unlink_parent(id);

        let mut placement = placement;
        for (child, global) in globals {
            if let Some(view) = self.view_mut(child) {
                view.parent = None;
                view.transform = global;
            }
            self.invalidate_tree(child);
            if let Some((layer, index)) = placement.as_mut() {
                self.layers[layer.index()].shift_insert(*index, child);
                if let Some(view) = self.view_mut(child) {
                    view.layer = Some(*layer);
                }
                *index += 1;
            }
        }

        let slot = &mut self.slots[id.index as usize];
        slot.view = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        debug!(?id, orphans = children.len(), "view destroyed");
        true
    }

    /// Access a view
    pub fn view(&self, id: ViewId) -> Option<&SurfaceView> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.view.as_ref())
    }

    fn view_mut(&mut self, id: ViewId) -> Option<&mut SurfaceView> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.view.as_mut())
    }

    /// Stack a view at the front of `layer`
    ///
    /// A view attached to a parent is detached first, keeping its global position. A view
    /// already stacked in another layer (or the same one) is moved, never duplicated.
    pub fn add_view(&mut self, id: ViewId, layer: Layer) -> bool {
        if self.view(id).is_none() {
            return false;
        }
        self.detach(id);
        self.unstack(id);
        self.layers[layer.index()].insert(id);
        if let Some(view) = self.view_mut(id) {
            view.layer = Some(layer);
        }
        trace!(?id, ?layer, "view stacked");
        true
    }

    /// Take a view out of the scene, without destroying it
    ///
    /// Returns whether the view was part of the scene.
    pub fn remove_view(&mut self, id: ViewId) -> bool {
        let Some(view) = self.view(id) else {
            return false;
        };
        let was_mapped = view.layer.is_some() || view.parent.is_some();
        self.detach(id);
        self.unstack(id);
        was_mapped
    }

    /// Attach `id` to `parent`, keeping its current global position
    ///
    /// Fails if either view is unknown, if `parent` cannot be inverted or if the operation would
    /// create a cycle.
    pub fn set_parent(&mut self, id: ViewId, parent: ViewId) -> bool {
        if !self.can_parent(id, parent) {
            return false;
        }
        let (Some(global), Some(parent_inverse)) = (self.global_transform(id), self.inverse_transform(parent))
        else {
            return false;
        };
        self.set_parent_with_transform(id, parent, parent_inverse * global)
    }

    /// Attach `id` to `parent` with a new local transform, relative to `parent`
    pub fn set_parent_with_transform(&mut self, id: ViewId, parent: ViewId, transform: Mat4) -> bool {
        if !self.can_parent(id, parent) {
            debug!(?id, ?parent, "refusing to reparent view");
            return false;
        }
        self.unstack(id);
        self.unlink_parent(id);
        if let Some(view) = self.view_mut(id) {
            view.parent = Some(parent);
            view.transform = transform;
        }
        if let Some(parent_view) = self.view_mut(parent) {
            parent_view.children.push(id);
        }
        self.invalidate_tree(id);
        trace!(?id, ?parent, "view attached");
        true
    }

    /// Detach a view from its parent, keeping its global position
    ///
    /// The view is not stacked afterwards. Returns `false` for unknown views.
    pub fn detach(&mut self, id: ViewId) -> bool {
        let Some(view) = self.view(id) else {
            return false;
        };
        if view.parent.is_none() {
            return true;
        }
        let Some(global) = self.global_transform(id) else {
            return false;
        };
        self.unlink_parent(id);
        if let Some(view) = self.view_mut(id) {
            view.transform = global;
        }
        self.invalidate_tree(id);
        true
    }

    /// Replace the local transform of a view
    pub fn set_transform(&mut self, id: ViewId, transform: Mat4) -> bool {
        let Some(view) = self.view_mut(id) else {
            return false;
        };
        view.transform = transform;
        self.invalidate_tree(id);
        true
    }

    /// Move a view so that its origin lies at `position`, in global coordinates
    ///
    /// Only the translation of the local transform changes.
    pub fn set_position(&mut self, id: ViewId, position: Point<f64>) -> bool {
        let Some(view) = self.view(id) else {
            return false;
        };
        let local = match view.parent {
            Some(parent) => match self.inverse_transform(parent) {
                Some(inverse) => position.transform(&inverse),
                None => return false,
            },
            None => position,
        };
        if let Some(view) = self.view_mut(id) {
            view.transform = transform::with_translation(view.transform, local);
        }
        self.invalidate_tree(id);
        true
    }

    /// Global position of the origin of a view
    pub fn position(&self, id: ViewId) -> Option<Point<f64>> {
        self.global_transform(id).map(|global| transform::translation_of(&global))
    }

    /// The local transform composed with every ancestor's transform
    pub fn global_transform(&self, id: ViewId) -> Option<Mat4> {
        let view = self.view(id)?;
        if let Some(global) = view.global_cache.get() {
            return Some(global);
        }
        let global = match view.parent.and_then(|parent| self.global_transform(parent)) {
            Some(parent_global) => parent_global * view.transform,
            None => view.transform,
        };
        view.global_cache.set(Some(global));
        Some(global)
    }

    /// Inverse of [`Scene::global_transform`], `None` if the transform cannot be inverted
    pub fn inverse_transform(&self, id: ViewId) -> Option<Mat4> {
        let view = self.view(id)?;
        if let Some(inverse) = view.inverse_cache.get() {
            return inverse;
        }
        let inverse = transform::invert(&self.global_transform(id)?);
        view.inverse_cache.set(Some(inverse));
        inverse
    }

    /// Map a view-local point to global coordinates
    pub fn to_global(&self, id: ViewId, local: Point<f64>) -> Option<Point<f64>> {
        self.global_transform(id).map(|global| local.transform(&global))
    }

    /// Map a global point to view-local coordinates
    pub fn to_local(&self, id: ViewId, global: Point<f64>) -> Option<Point<f64>> {
        self.inverse_transform(id).map(|inverse| global.transform(&inverse))
    }

    /// The layer a view is drawn in, inherited from its root ancestor
    pub fn layer_of(&self, id: ViewId) -> Option<Layer> {
        self.root_of(id).and_then(|root| self.view(root)?.layer)
    }

    /// Parent of a view
    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.view(id)?.parent
    }

    /// Every view taking part in the scene, back to front
    pub fn views_back_to_front(&self) -> Vec<ViewId> {
        let mut ordered = Vec::new();
        for layer in &self.layers {
            for root in layer {
                self.push_tree(*root, &mut ordered);
            }
        }
        ordered
    }

    /// Find the front-most view accepting a global point
    ///
    /// `accept` receives each candidate view front to back, along with the point mapped into the
    /// view's local coordinates. The first view it accepts wins.
    pub fn view_under<F>(&self, point: Point<f64>, mut accept: F) -> Option<(ViewId, Point<f64>)>
    where
        F: FnMut(&SurfaceView, Point<f64>) -> bool,
    {
        self.views_back_to_front().into_iter().rev().find_map(|id| {
            let view = self.view(id)?;
            let local = self.to_local(id, point)?;
            accept(view, local).then_some((id, local))
        })
    }

    fn push_tree(&self, id: ViewId, ordered: &mut Vec<ViewId>) {
        let Some(view) = self.view(id) else {
            return;
        };
        ordered.push(id);
        for child in &view.children {
            self.push_tree(*child, ordered);
        }
    }

    fn root_of(&self, mut id: ViewId) -> Option<ViewId> {
        self.view(id)?;
        while let Some(parent) = self.parent(id) {
            id = parent;
        }
        Some(id)
    }

    fn can_parent(&self, id: ViewId, parent: ViewId) -> bool {
        if id == parent || self.view(id).is_none() || self.view(parent).is_none() {
            return false;
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == id {
                return false;
            }
            ancestor = self.parent(current);
        }
        true
    }

    fn unstack(&mut self, id: ViewId) {
        let Some(layer) = self.view_mut(id).and_then(|view| view.layer.take()) else {
            return;
        };
        self.layers[layer.index()].shift_remove(&id);
    }

    fn unlink_parent(&mut self, id: ViewId) {
        let Some(parent) = self.view_mut(id).and_then(|view| view.parent.take()) else {
            return;
        };
        if let Some(parent_view) = self.view_mut(parent) {
            parent_view.children.retain(|child| *child != id);
        }
    }

    fn invalidate_tree(&self, id: ViewId) {
        let Some(view) = self.view(id) else {
            return;
        };
        view.invalidate();
        for child in &view.children {
            self.invalidate_tree(*child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Rectangle, Size};

    fn surface(id: u32) -> SurfaceId {
        SurfaceId::from_raw(id)
    }

    fn mapped(scene: &mut Scene, id: u32, layer: Layer, x: f64, y: f64) -> ViewId {
        let view = scene.create_view(surface(id));
        scene.add_view(view, layer);
        scene.set_position(view, Point::new(x, y));
        view
    }

    fn hit(scene: &Scene, x: f64, y: f64) -> Option<ViewId> {
        let bounds = Rectangle::from_size(Size::new(100.0, 100.0));
        scene
            .view_under(Point::new(x, y), |_, local| bounds.contains(local))
            .map(|(id, _)| id)
    }

    #[test]
    fn overlapping_views_resolve_front_to_back() {
        let mut scene = Scene::new();
        let back = mapped(&mut scene, 1, Layer::Application, 0.0, 0.0);
        let front = mapped(&mut scene, 2, Layer::Application, 50.0, 50.0);

        assert_eq!(hit(&scene, 75.0, 75.0), Some(front));
        assert_eq!(hit(&scene, 25.0, 25.0), Some(back));
        assert_eq!(hit(&scene, 75.0, 75.0), Some(front));
        assert_eq!(hit(&scene, 500.0, 500.0), None);

        // raising the back view flips the result
        scene.add_view(back, Layer::Application);
        assert_eq!(hit(&scene, 75.0, 75.0), Some(back));
    }

    #[test]
    fn overlay_wins_over_application() {
        let mut scene = Scene::new();
        let overlay = mapped(&mut scene, 1, Layer::Overlay, 0.0, 0.0);
        let app = mapped(&mut scene, 2, Layer::Application, 0.0, 0.0);

        assert_eq!(hit(&scene, 10.0, 10.0), Some(overlay));
        assert_eq!(scene.views_back_to_front(), vec![app, overlay]);
    }

    #[test]
    fn reordering_disjoint_views_keeps_hits() {
        let mut scene = Scene::new();
        let left = mapped(&mut scene, 1, Layer::Application, 0.0, 0.0);
        let right = mapped(&mut scene, 2, Layer::Application, 200.0, 0.0);

        let before = (hit(&scene, 10.0, 10.0), hit(&scene, 210.0, 10.0));
        scene.add_view(left, Layer::Application);
        let after = (hit(&scene, 10.0, 10.0), hit(&scene, 210.0, 10.0));

        assert_eq!(before, (Some(left), Some(right)));
        assert_eq!(before, after);
    }

    #[test]
    fn views_live_in_one_layer_at_a_time() {
        let mut scene = Scene::new();
        let view = mapped(&mut scene, 1, Layer::Background, 0.0, 0.0);

        scene.add_view(view, Layer::Overlay);

        assert_eq!(scene.layer_of(view), Some(Layer::Overlay));
        assert_eq!(scene.views_back_to_front(), vec![view]);
        assert!(scene.remove_view(view));
        assert!(scene.views_back_to_front().is_empty());
        assert!(!scene.remove_view(view));
    }

    #[test]
    fn reparenting_keeps_global_position() {
        let mut scene = Scene::new();
        let parent = mapped(&mut scene, 1, Layer::Application, 100.0, 100.0);
        let child = mapped(&mut scene, 2, Layer::Application, 130.0, 120.0);

        assert!(scene.set_parent(child, parent));
        assert_eq!(scene.position(child), Some(Point::new(130.0, 120.0)));
        assert_eq!(transform::translation_of(&scene.view(child).unwrap().transform()), Point::new(30.0, 20.0));
        assert_eq!(scene.layer_of(child), Some(Layer::Application));
        assert_eq!(scene.views_back_to_front(), vec![parent, child]);

        // children follow their parent
        scene.set_position(parent, Point::new(0.0, 0.0));
        assert_eq!(scene.position(child), Some(Point::new(30.0, 20.0)));

        assert!(scene.detach(child));
        assert_eq!(scene.position(child), Some(Point::new(30.0, 20.0)));
        assert_eq!(scene.layer_of(child), None);
    }

    #[test]
    fn explicit_local_transform_is_relative_to_parent() {
        let mut scene = Scene::new();
        let parent = mapped(&mut scene, 1, Layer::Application, 100.0, 50.0);
        let child = scene.create_view(surface(2));

        assert!(scene.set_parent_with_transform(child, parent, transform::translation(10.0, 5.0)));
        assert_eq!(scene.position(child), Some(Point::new(110.0, 55.0)));
        assert_eq!(scene.to_local(child, Point::new(115.0, 60.0)), Some(Point::new(5.0, 5.0)));

        scene.set_position(child, Point::new(0.0, 0.0));
        assert_eq!(scene.position(child), Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn cycles_are_refused() {
        let mut scene = Scene::new();
        let a = mapped(&mut scene, 1, Layer::Application, 0.0, 0.0);
        let b = scene.create_view(surface(2));
        let c = scene.create_view(surface(3));

        assert!(scene.set_parent(b, a));
        assert!(scene.set_parent(c, b));
        assert!(!scene.set_parent(a, c));
        assert!(!scene.set_parent(a, a));
        assert_eq!(scene.parent(a), None);
    }

    #[test]
    fn destroying_a_parent_detaches_children_in_place() {
        let mut scene = Scene::new();
        let below = mapped(&mut scene, 1, Layer::Application, 0.0, 0.0);
        let parent = mapped(&mut scene, 2, Layer::Application, 100.0, 100.0);
        let above = mapped(&mut scene, 3, Layer::Application, 0.0, 0.0);
        let child = scene.create_view(surface(4));
        scene.set_parent_with_transform(child, parent, transform::translation(10.0, 10.0));

        assert!(scene.destroy_view(parent));

        assert!(scene.view(parent).is_none());
        assert_eq!(scene.parent(child), None);
        assert_eq!(scene.position(child), Some(Point::new(110.0, 110.0)));
        assert_eq!(scene.views_back_to_front(), vec![below, child, above]);
        assert!(!scene.destroy_view(parent));
    }

    #[test]
    fn stale_ids_do_not_resolve_after_reuse() {
        let mut scene = Scene::new();
        let old = scene.create_view(surface(1));
        scene.destroy_view(old);
        let new = scene.create_view(surface(2));

        assert_eq!(old.index, new.index);
        assert!(scene.view(old).is_none());
        assert_eq!(scene.view(new).map(SurfaceView::surface), Some(surface(2)));
    }
}
