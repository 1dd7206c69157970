//! Linear algebra aliases shared by the positioning pipeline.
//!
//! Pixel, virtual-plane and world coordinates are all carried as [`Pt2`];
//! pixel-space residuals are [`Vec2`].

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Lift a virtual-plane point onto the `z = 0` calibration plane.
pub fn lift_to_plane(p: &Pt2) -> Pt3 {
    Pt3::new(p.x, p.y, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifted_points_lie_on_the_calibration_plane() {
        let p = lift_to_plane(&Pt2::new(3.0, -4.0));
        assert_eq!(p, Pt3::new(3.0, -4.0, 0.0));
    }
}
