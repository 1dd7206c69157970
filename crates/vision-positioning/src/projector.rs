//! Forward projection from the virtual calibration plane to pixels.

use thiserror::Error;

use crate::calibration::{CalibrationError, CalibrationParameters};
use crate::models::PinholeCamera;
use crate::{Iso3, Pt2, Pt3, Real};

/// Failure of a single forward projection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    /// The plane point lands behind the camera.
    #[error("point projects behind the camera (z = {z})")]
    BehindCamera { z: Real },
    /// The projection produced NaN or infinity.
    #[error("projection produced a non-finite pixel ({u}, {v})")]
    NonFinite { u: Real, v: Real },
}

/// Maps a 3D point on the calibration plane (`z = 0`) to the pixel it is
/// observed at.
///
/// Called once per solver iteration, so implementations must be pure and
/// return promptly.
pub trait ForwardProjector {
    fn project(&self, plane_point: &Pt3) -> Result<Pt2, ProjectionError>;
}

impl<F> ForwardProjector for F
where
    F: Fn(&Pt3) -> Result<Pt2, ProjectionError>,
{
    fn project(&self, plane_point: &Pt3) -> Result<Pt2, ProjectionError> {
        self(plane_point)
    }
}

/// Pinhole projector with Brown-Conrady distortion built from
/// [`CalibrationParameters`].
#[derive(Debug, Clone)]
pub struct CalibratedProjector {
    params: CalibrationParameters,
    camera_se3_plane: Iso3,
    camera: PinholeCamera,
}

impl CalibratedProjector {
    pub fn new(params: CalibrationParameters) -> Result<Self, CalibrationError> {
        let camera = params.camera()?;
        let camera_se3_plane = params.pose();
        Ok(Self {
            params,
            camera_se3_plane,
            camera,
        })
    }

    pub fn parameters(&self) -> &CalibrationParameters {
        &self.params
    }
}

impl ForwardProjector for CalibratedProjector {
    fn project(&self, plane_point: &Pt3) -> Result<Pt2, ProjectionError> {
        let mut p_c = self.camera_se3_plane * plane_point;
        // A point on the optical centre's own plane is projected at unit
        // depth, as OpenCV's projectPoints does.
        if p_c.z == 0.0 {
            p_c.z = 1.0;
        }
        let px = self
            .camera
            .project_point(&p_c)
            .ok_or(ProjectionError::BehindCamera { z: p_c.z })?;
        if !(px.x.is_finite() && px.y.is_finite()) {
            return Err(ProjectionError::NonFinite { u: px.x, v: px.y });
        }
        Ok(Pt2::from(px))
    }
}
