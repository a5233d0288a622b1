//! Affine 4x4 transforms shared by the scene graph and the interactive resize logic.
//!
//! Matrices are column major ([`cgmath`] layout) and multiply column vectors, so the
//! translation lives in the last column. The helpers below expose that column with the
//! `m30`/`m31` naming common to GL code: `m30` is the x translation and `m31` the y translation,
//! `m00` and `m11` scale the x and y axes.

use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};

use super::Point;

/// A 4x4 affine transform over `f64`
pub type Mat4 = Matrix4<f64>;

const fn diagonal(x: f64, y: f64) -> Mat4 {
    Matrix4 {
        x: Vector4 {
            x,
            y: 0.0,
            z: 0.0,
            w: 0.0,
        },
        y: Vector4 {
            x: 0.0,
            y,
            z: 0.0,
            w: 0.0,
        },
        z: Vector4 {
            x: 0.0,
            y: 0.0,
            z: 1.0,
            w: 0.0,
        },
        w: Vector4 {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        },
    }
}

/// Identity
pub const NORMAL: Mat4 = diagonal(1.0, 1.0);
/// Rotation by 180 degrees around the origin
pub const _180: Mat4 = diagonal(-1.0, -1.0);
/// Mirrored along the vertical axis
pub const FLIPPED: Mat4 = diagonal(-1.0, 1.0);
/// Mirrored along the vertical axis, then rotated by 180 degrees
pub const FLIPPED_180: Mat4 = diagonal(1.0, -1.0);

/// A pure translation
pub fn translation(x: f64, y: f64) -> Mat4 {
    Matrix4::from_translation(Vector3::new(x, y, 0.0))
}

/// The translation part of an affine transform
pub fn translation_of(matrix: &Mat4) -> Point<f64> {
    Point::new(matrix.w.x, matrix.w.y)
}

/// Replace the translation part of an affine transform, leaving its linear part untouched
pub fn with_translation(mut matrix: Mat4, position: Point<f64>) -> Mat4 {
    matrix.w.x = position.x;
    matrix.w.y = position.y;
    matrix
}

/// Invert a transform, `None` if it collapses an axis
pub fn invert(matrix: &Mat4) -> Option<Mat4> {
    matrix.invert()
}
