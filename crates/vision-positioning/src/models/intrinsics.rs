use nalgebra::{Matrix3, RealField, Vector2};
use serde::{Deserialize, Serialize};

/// Intrinsics that map distorted normalized coordinates to pixel coordinates.
pub trait IntrinsicsModel<S: RealField + Copy> {
    fn to_pixel(&self, n: &Vector2<S>) -> Vector2<S>;
}

/// Standard pinhole intrinsics with optional skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxFyCxCySkew<S: RealField + Copy> {
    /// Focal length in pixels along X.
    pub fx: S,
    /// Focal length in pixels along Y.
    pub fy: S,
    /// Principal point X coordinate in pixels.
    pub cx: S,
    /// Principal point Y coordinate in pixels.
    pub cy: S,
    /// Skew term (typically 0).
    pub skew: S,
}

impl<S: RealField + Copy> FxFyCxCySkew<S> {
    /// Return the 3x3 camera intrinsics matrix K.
    pub fn k_matrix(&self) -> Matrix3<S> {
        Matrix3::new(
            self.fx,
            self.skew,
            self.cx,
            S::zero(),
            self.fy,
            self.cy,
            S::zero(),
            S::zero(),
            S::one(),
        )
    }

    /// Attempt to construct intrinsics from a 3×3 calibration matrix `K`.
    ///
    /// The matrix is first normalised so that `K[2, 2] == 1`, then checked
    /// against the upper-triangular form above. Returns `None` if the
    /// structure does not match within `eps`.
    pub fn try_from_k_matrix(k: &Matrix3<S>, eps: S) -> Option<Self> {
        let k33 = k[(2, 2)];
        if k33.abs() < eps {
            return None;
        }
        let k_norm = *k / k33;

        if k_norm[(1, 0)].abs() > eps || k_norm[(2, 0)].abs() > eps || k_norm[(2, 1)].abs() > eps
        {
            return None;
        }

        Some(Self {
            fx: k_norm[(0, 0)],
            skew: k_norm[(0, 1)],
            cx: k_norm[(0, 2)],
            fy: k_norm[(1, 1)],
            cy: k_norm[(1, 2)],
        })
    }
}

impl<S: RealField + Copy> IntrinsicsModel<S> for FxFyCxCySkew<S> {
    fn to_pixel(&self, n: &Vector2<S>) -> Vector2<S> {
        let u = self.fx * n.x + self.skew * n.y + self.cx;
        let v = self.fy * n.y + self.cy;
        Vector2::new(u, v)
    }
}
