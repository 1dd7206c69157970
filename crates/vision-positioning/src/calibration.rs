//! Calibrated camera parameters as consumed by the positioning solver.
//!
//! The layout mirrors what a planar calibration (e.g. OpenCV's
//! `calibrateCamera`) produces for the view that defines the virtual
//! calibration plane: a Rodrigues rotation vector, a translation vector,
//! the intrinsic matrix and distortion coefficients in `[k1, k2, p1, p2, k3]`
//! order.

use nalgebra::{Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{make_pinhole_camera, BrownConrady5, FxFyCxCySkew, PinholeCamera};
use crate::{Iso3, Mat3, Real, Vec3};

/// Errors raised while validating [`CalibrationParameters`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    /// A parameter is NaN or infinite.
    #[error("{field} contains a non-finite value")]
    NonFinite { field: &'static str },
    /// The intrinsic matrix is not of the form `[fx s cx; 0 fy cy; 0 0 1]`.
    #[error("intrinsic matrix is not upper-triangular with a non-zero last row")]
    MalformedIntrinsics,
    /// A focal length is zero.
    #[error("focal length must be non-zero, got fx={fx}, fy={fy}")]
    DegenerateFocalLength { fx: Real, fy: Real },
    /// Unsupported number of distortion coefficients.
    #[error("expected 0, 4 or 5 distortion coefficients, got {0}")]
    DistortionLength(usize),
}

/// Immutable calibration bundle for one camera and one calibration plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Axis-angle rotation (plane frame to camera frame), radians.
    pub rotation_vector: [Real; 3],
    /// Translation (plane frame to camera frame).
    pub translation_vector: [Real; 3],
    /// Row-major 3×3 intrinsic matrix `K`.
    pub intrinsic_matrix: [[Real; 3]; 3],
    /// Distortion coefficients in OpenCV order `[k1, k2, p1, p2, k3]`.
    #[serde(default)]
    pub distortion_coefficients: Vec<Real>,
}

impl CalibrationParameters {
    /// Zero pose, unit intrinsics and no distortion.
    pub fn identity() -> Self {
        Self {
            rotation_vector: [0.0; 3],
            translation_vector: [0.0; 3],
            intrinsic_matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            distortion_coefficients: Vec::new(),
        }
    }

    /// Intrinsic matrix as an `nalgebra` matrix.
    pub fn k_matrix(&self) -> Mat3 {
        let m = &self.intrinsic_matrix;
        Mat3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    /// Rigid transform mapping calibration-plane points into the camera frame.
    pub fn pose(&self) -> Iso3 {
        let r = self.rotation_vector;
        let t = self.translation_vector;
        Iso3::from_parts(
            Translation3::new(t[0], t[1], t[2]),
            UnitQuaternion::from_scaled_axis(Vec3::new(r[0], r[1], r[2])),
        )
    }

    /// Check that the bundle describes a usable pinhole camera.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !all_finite(&self.rotation_vector) {
            return Err(CalibrationError::NonFinite {
                field: "rotation_vector",
            });
        }
        if !all_finite(&self.translation_vector) {
            return Err(CalibrationError::NonFinite {
                field: "translation_vector",
            });
        }
        if !self.intrinsic_matrix.iter().all(|row| all_finite(row)) {
            return Err(CalibrationError::NonFinite {
                field: "intrinsic_matrix",
            });
        }
        if !all_finite(&self.distortion_coefficients) {
            return Err(CalibrationError::NonFinite {
                field: "distortion_coefficients",
            });
        }

        match self.distortion_coefficients.len() {
            0 | 4 | 5 => {}
            n => return Err(CalibrationError::DistortionLength(n)),
        }

        let k = self.intrinsics()?;
        if k.fx == 0.0 || k.fy == 0.0 {
            return Err(CalibrationError::DegenerateFocalLength { fx: k.fx, fy: k.fy });
        }
        Ok(())
    }

    /// Decompose the intrinsic matrix.
    pub fn intrinsics(&self) -> Result<FxFyCxCySkew<Real>, CalibrationError> {
        FxFyCxCySkew::try_from_k_matrix(&self.k_matrix(), 1e-9)
            .ok_or(CalibrationError::MalformedIntrinsics)
    }

    pub fn distortion(&self) -> BrownConrady5<Real> {
        BrownConrady5::from_opencv(&self.distortion_coefficients)
    }

    /// Validate and build the camera model used for forward projection.
    pub fn camera(&self) -> Result<PinholeCamera, CalibrationError> {
        self.validate()?;
        Ok(make_pinhole_camera(self.intrinsics()?, self.distortion()))
    }
}

fn all_finite(values: &[Real]) -> bool {
    values.iter().all(|v| v.is_finite())
}
