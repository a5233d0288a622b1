use crate::utils::{Point, Rectangle};

/// Kind of a rectangle part of a region
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RectangleKind {
    /// This rectangle should be added to the region
    Add,
    /// The intersection of this rectangle with the region should
    /// be removed from the region
    Subtract,
}

/// Description of a region
///
/// A region is defined as an union and difference of rectangle.
///
/// This struct contains an ordered `Vec` containing the rectangles defining
/// a region. They should be added or subtracted in this order to compute the
/// actual contents of the region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    /// List of rectangle part of this region
    pub rects: Vec<(RectangleKind, Rectangle<i32>)>,
}

impl Region {
    /// An empty region
    pub fn new() -> Region {
        Region::default()
    }

    /// Append a rectangle to the region
    pub fn add(&mut self, rect: Rectangle<i32>, kind: RectangleKind) {
        self.rects.push((kind, rect));
    }

    /// Checks whether given point is inside the region
    pub fn contains<P: Into<Point<i32>>>(&self, point: P) -> bool {
        let point = point.into();
        let mut contains = false;
        for (kind, rect) in &self.rects {
            if rect.contains(point) {
                match kind {
                    RectangleKind::Add => contains = true,
                    RectangleKind::Subtract => contains = false,
                }
            }
        }
        contains
    }
}
