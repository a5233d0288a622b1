use crate::utils::{
    transform::{self, Mat4, FLIPPED, FLIPPED_180, NORMAL, _180},
    Point, Size,
};

use super::ResizeEdge;

/// The part of a surface grabbed for an interactive resize
///
/// Each quadrant selects a transform mapping the pointer location, in view-local coordinates, onto
/// the new `(width, height)` of the surface. Edges pin the other axis, corners drive both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// No edge, the pointer location is the size
    None,
    /// Top edge
    Top,
    /// Bottom edge
    Bottom,
    /// Left edge
    Left,
    /// Top left corner
    TopLeft,
    /// Bottom left corner
    BottomLeft,
    /// Right edge
    Right,
    /// Top right corner
    TopRight,
    /// Bottom right corner
    BottomRight,
}

impl Quadrant {
    /// Decode the edges of a resize request
    ///
    /// Combinations that do not describe an edge or a corner map to [`Quadrant::None`].
    pub fn from_edges(edges: u32) -> Quadrant {
        let Some(edges) = ResizeEdge::from_bits(edges) else {
            return Quadrant::None;
        };
        [
            Quadrant::Top,
            Quadrant::Bottom,
            Quadrant::Left,
            Quadrant::TopLeft,
            Quadrant::BottomLeft,
            Quadrant::Right,
            Quadrant::TopRight,
            Quadrant::BottomRight,
        ]
        .into_iter()
        .find(|quadrant| quadrant.edges() == edges)
        .unwrap_or(Quadrant::None)
    }

    /// The edges sent back in configure events
    pub fn edges(self) -> ResizeEdge {
        match self {
            Quadrant::None => ResizeEdge::empty(),
            Quadrant::Top => ResizeEdge::TOP,
            Quadrant::Bottom => ResizeEdge::BOTTOM,
            Quadrant::Left => ResizeEdge::LEFT,
            Quadrant::TopLeft => ResizeEdge::TOP_LEFT,
            Quadrant::BottomLeft => ResizeEdge::BOTTOM_LEFT,
            Quadrant::Right => ResizeEdge::RIGHT,
            Quadrant::TopRight => ResizeEdge::TOP_RIGHT,
            Quadrant::BottomRight => ResizeEdge::BOTTOM_RIGHT,
        }
    }

    fn base(self) -> Mat4 {
        match self {
            Quadrant::None | Quadrant::BottomRight => NORMAL,
            Quadrant::TopLeft => _180,
            Quadrant::BottomLeft => FLIPPED,
            Quadrant::TopRight => FLIPPED_180,
            Quadrant::Top => pin_width(FLIPPED_180),
            Quadrant::Bottom => pin_width(NORMAL),
            Quadrant::Left => pin_height(FLIPPED),
            Quadrant::Right => pin_height(NORMAL),
        }
    }

    /// The transform mapping the pointer location onto the new size
    ///
    /// `start` is the pointer location, in view-local coordinates, when the resize started. It maps
    /// onto the current `size`.
    pub fn transform(self, start: Point<f64>, size: Size<f64>) -> Mat4 {
        if self == Quadrant::None {
            return NORMAL;
        }
        let base = self.base();
        let offset = Point::new(size.w, size.h) - start.transform(&base);
        transform::with_translation(base, offset)
    }
}

/// Apply a resize transform to a pointer location, both dimensions are at least 1
pub fn resized(transform: &Mat4, local: Point<f64>) -> Size<i32> {
    let size = local.transform(transform).to_i32_trunc();
    Size::new(size.x.max(1), size.y.max(1))
}

fn pin_width(mut matrix: Mat4) -> Mat4 {
    matrix.x.x = 0.0;
    matrix
}

fn pin_height(mut matrix: Mat4) -> Mat4 {
    matrix.y.y = 0.0;
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(edges: u32, dx: f64, dy: f64) -> (ResizeEdge, Size<i32>) {
        let start = Point::new(50.0, 50.0);
        let quadrant = Quadrant::from_edges(edges);
        let transform = quadrant.transform(start, Size::new(100.0, 100.0));
        (
            quadrant.edges(),
            resized(&transform, start + Point::new(dx, dy)),
        )
    }

    #[test]
    fn every_quadrant_resizes_its_edges() {
        let cases = [
            (0, ResizeEdge::empty(), (70, 60)),
            (1, ResizeEdge::TOP, (100, 90)),
            (2, ResizeEdge::BOTTOM, (100, 110)),
            (4, ResizeEdge::LEFT, (80, 100)),
            (5, ResizeEdge::TOP_LEFT, (80, 90)),
            (6, ResizeEdge::BOTTOM_LEFT, (80, 110)),
            (8, ResizeEdge::RIGHT, (120, 100)),
            (9, ResizeEdge::TOP_RIGHT, (120, 90)),
            (10, ResizeEdge::BOTTOM_RIGHT, (120, 110)),
        ];

        for (edges, expected_edges, (w, h)) in cases {
            assert_eq!(drag(edges, 20.0, 10.0), (expected_edges, Size::new(w, h)), "edges {edges}");
        }
    }

    #[test]
    fn unknown_edges_fall_back_to_none() {
        for edges in [3, 7, 11, 12, 15, 16, 0xffff_ffff] {
            assert_eq!(Quadrant::from_edges(edges), Quadrant::None, "edges {edges}");
        }
    }

    #[test]
    fn sizes_are_clamped_and_truncated() {
        assert_eq!(drag(1, 0.0, 500.0).1, Size::new(100, 1));
        assert_eq!(drag(4, 500.0, 0.0).1, Size::new(1, 100));
        assert_eq!(drag(10, 0.9, 0.9).1, Size::new(100, 100));
    }
}
