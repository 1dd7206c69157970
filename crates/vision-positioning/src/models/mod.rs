//! Camera model building blocks used by the built-in forward projector.
//!
//! The pipeline has three stages:
//!
//! 1. `ProjectionModel`: map a 3D direction to normalized coordinates (pinhole).
//! 2. `DistortionModel`: apply radial/tangential distortion in normalized space.
//! 3. `IntrinsicsModel`: map normalized coordinates to pixels (K matrix).

mod camera;
mod distortion;
mod intrinsics;
mod projection;

pub use camera::*;
pub use distortion::*;
pub use intrinsics::*;
pub use projection::*;

use crate::Real;

/// Pinhole camera with Brown-Conrady distortion, as produced by calibration.
pub type PinholeCamera = Camera<Real, Pinhole, BrownConrady5<Real>, FxFyCxCySkew<Real>>;

pub fn make_pinhole_camera(k: FxFyCxCySkew<Real>, dist: BrownConrady5<Real>) -> PinholeCamera {
    Camera::new(Pinhole, dist, k)
}
