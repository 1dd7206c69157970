use nalgebra::{RealField, Vector2};
use serde::{Deserialize, Serialize};

pub trait DistortionModel<S: RealField + Copy> {
    fn distort(&self, n_undist: &Vector2<S>) -> Vector2<S>;
}

/// Brown-Conrady radial-tangential model with three radial and two
/// tangential terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5<S: RealField> {
    pub k1: S,
    pub k2: S,
    pub k3: S,
    pub p1: S,
    pub p2: S,
}

impl<S: RealField + Copy> BrownConrady5<S> {
    /// Build from coefficients in OpenCV order `[k1, k2, p1, p2, k3]`.
    ///
    /// Missing trailing coefficients are treated as zero.
    pub fn from_opencv(coeffs: &[S]) -> Self {
        let at = |i: usize| coeffs.get(i).copied().unwrap_or_else(S::zero);
        Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
        }
    }
}

impl<S: RealField + Copy> DistortionModel<S> for BrownConrady5<S> {
    fn distort(&self, n_undist: &Vector2<S>) -> Vector2<S> {
        let x = n_undist.x;
        let y = n_undist.y;

        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = S::one() + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let two = S::one() + S::one();
        let x2 = x * x;
        let y2 = y * y;
        let xy = x * y;

        let x_tan = two * self.p1 * xy + self.p2 * (r2 + two * x2);
        let y_tan = self.p1 * (r2 + two * y2) + two * self.p2 * xy;

        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }
}
