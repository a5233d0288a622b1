use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use cgmath::{Matrix4, Vector4};

/// Trait for types serving as a coordinate for other geometry utils
pub trait Coordinate:
    Sized + Add<Self, Output = Self> + Sub<Self, Output = Self> + PartialOrd + Default + Copy + fmt::Debug
{
    /// A Coordinate that is 0
    const ZERO: Self;
    /// Convert the coordinate to a f64
    fn to_f64(self) -> f64;
    /// Convert to this coordinate from a f64, truncating toward zero
    fn from_f64(v: f64) -> Self;
}

impl Coordinate for i32 {
    const ZERO: i32 = 0;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as i32
    }
}

impl Coordinate for f64 {
    const ZERO: f64 = 0.0;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}

/// A point as defined by its x and y coordinates
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point<N> {
    /// horizontal coordinate
    pub x: N,
    /// vertical coordinate
    pub y: N,
}

impl<N: Coordinate> Point<N> {
    /// Create a new point
    #[inline]
    pub fn new(x: N, y: N) -> Point<N> {
        Point { x, y }
    }

    /// Convert the underlying numerical type to f64 for floating point manipulations
    #[inline]
    pub fn to_f64(self) -> Point<f64> {
        Point {
            x: self.x.to_f64(),
            y: self.y.to_f64(),
        }
    }

    /// Homogeneous representation of this point, suitable for a 4x4 affine transform
    #[inline]
    pub fn to_vec4(self) -> Vector4<f64> {
        Vector4::new(self.x.to_f64(), self.y.to_f64(), 0.0, 1.0)
    }

    /// Convert this [`Point`] to a [`Size`] with the same coordinates
    #[inline]
    pub fn to_size(self) -> Size<N> {
        Size { w: self.x, h: self.y }
    }
}

impl Point<f64> {
    /// Take the x/y components of a homogeneous vector
    #[inline]
    pub fn from_vec4(v: Vector4<f64>) -> Point<f64> {
        Point { x: v.x, y: v.y }
    }

    /// Apply an affine transform to this point
    #[inline]
    pub fn transform(self, matrix: &Matrix4<f64>) -> Point<f64> {
        Point::from_vec4(matrix * self.to_vec4())
    }

    /// Convert to i32, truncating toward zero
    #[inline]
    pub fn to_i32_trunc(self) -> Point<i32> {
        Point {
            x: self.x as i32,
            y: self.y as i32,
        }
    }

    /// Convert to i32 by rounding
    #[inline]
    pub fn to_i32_round(self) -> Point<i32> {
        Point {
            x: self.x.round() as i32,
            y: self.y.round() as i32,
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for Point<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point").field("x", &self.x).field("y", &self.y).finish()
    }
}

impl<N> From<(N, N)> for Point<N> {
    #[inline]
    fn from((x, y): (N, N)) -> Point<N> {
        Point { x, y }
    }
}

impl<N> From<Point<N>> for (N, N) {
    #[inline]
    fn from(point: Point<N>) -> (N, N) {
        (point.x, point.y)
    }
}

impl<N: Coordinate> Add for Point<N> {
    type Output = Point<N>;
    #[inline]
    fn add(self, other: Point<N>) -> Point<N> {
        Point {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl<N: Coordinate> AddAssign for Point<N> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<N: Coordinate> Sub for Point<N> {
    type Output = Point<N>;
    #[inline]
    fn sub(self, other: Point<N>) -> Point<N> {
        Point {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl<N: Coordinate> SubAssign for Point<N> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<N: Coordinate + Neg<Output = N>> Neg for Point<N> {
    type Output = Point<N>;
    #[inline]
    fn neg(self) -> Point<N> {
        Point {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// A size as defined by its width and height
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Size<N> {
    /// horizontal coordinate
    pub w: N,
    /// vertical coordinate
    pub h: N,
}

impl<N: Coordinate> Size<N> {
    /// Create a new size
    #[inline]
    pub fn new(w: N, h: N) -> Size<N> {
        Size { w, h }
    }

    /// Convert the underlying numerical type to f64 for floating point manipulations
    #[inline]
    pub fn to_f64(self) -> Size<f64> {
        Size {
            w: self.w.to_f64(),
            h: self.h.to_f64(),
        }
    }

    /// Check if this [`Size`] is empty
    ///
    /// Returns true if either the width or the height is zero or negative
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w <= N::ZERO || self.h <= N::ZERO
    }
}

impl<N: fmt::Debug> fmt::Debug for Size<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Size").field("w", &self.w).field("h", &self.h).finish()
    }
}

impl<N> From<(N, N)> for Size<N> {
    #[inline]
    fn from((w, h): (N, N)) -> Size<N> {
        Size { w, h }
    }
}

/// A rectangle defined by its top-left corner and dimensions
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rectangle<N> {
    /// Location of the top-left corner of the rectangle
    pub loc: Point<N>,
    /// Size of the rectangle, as (width, height)
    pub size: Size<N>,
}

impl<N: Coordinate> Rectangle<N> {
    /// Create a new [`Rectangle`] from the coordinates of its top-left corner and its dimensions
    #[inline]
    pub fn new(loc: Point<N>, size: Size<N>) -> Self {
        Rectangle { loc, size }
    }

    /// Create a new [`Rectangle`] at the origin with the given size
    #[inline]
    pub fn from_size(size: Size<N>) -> Self {
        Rectangle {
            loc: Point::new(N::ZERO, N::ZERO),
            size,
        }
    }

    /// Convert the underlying numerical type to another
    #[inline]
    pub fn to_f64(self) -> Rectangle<f64> {
        Rectangle {
            loc: self.loc.to_f64(),
            size: self.size.to_f64(),
        }
    }

    /// Checks whether given [`Point`] is inside the rectangle
    ///
    /// The left and top edges are inclusive, the right and bottom edges exclusive.
    #[inline]
    pub fn contains<P: Into<Point<N>>>(self, point: P) -> bool {
        let p: Point<N> = point.into();
        (p.x >= self.loc.x)
            && (p.x < self.loc.x + self.size.w)
            && (p.y >= self.loc.y)
            && (p.y < self.loc.y + self.size.h)
    }

    /// Checks whether a given [`Rectangle`] overlaps with this one
    #[inline]
    pub fn overlaps(self, other: Rectangle<N>) -> bool {
        self.loc.x < other.loc.x + other.size.w
            && other.loc.x < self.loc.x + self.size.w
            && self.loc.y < other.loc.y + other.size.h
            && other.loc.y < self.loc.y + self.size.h
    }
}

impl<N: fmt::Debug> fmt::Debug for Rectangle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rectangle")
            .field("x", &self.loc.x)
            .field("y", &self.loc.y)
            .field("width", &self.size.w)
            .field("height", &self.size.h)
            .finish()
    }
}
