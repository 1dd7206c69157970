//! Vision positioning by camera calibration with iterative approximation.
//!
//! Converts an observed pixel into a 2D world coordinate (for example a
//! robot-arm workspace) without inverting the camera model. The solver
//! predicts a point on the virtual calibration plane, projects it through a
//! calibrated camera, compares against the observed pixel and corrects the
//! prediction until the residual is acceptable or the time budget runs out.
//!
//! Pipeline:
//! `pixel -> [predict <-> project <-> correct] -> plane -> transform -> offset -> inversion -> world`
//!
//! # Modules
//!
//! - \[`models`\]: pinhole camera with Brown-Conrady distortion.
//! - \[`calibration`\]: calibrated parameter bundle and its validation.
//! - \[`projector`\]: forward projection from the plane to pixels.
//! - \[`corrector`\]: pluggable correction policies.
//! - \[`transform`\]: plane-to-world transform and world mapping.
//! - \[`clock`\]: monotonic and deterministic time sources.
//! - \[`solver`\]: the convergence loop.
//! - \[`config`\]: JSON configuration of a full setup.
//!
//! # Example
//!
//! ```no_run
//! use vision_positioning::{CalibrationParameters, ImageToWorldSolver};
//!
//! let solver = ImageToWorldSolver::configure(CalibrationParameters::identity(), 5.0).unwrap();
//! let world = solver.solve(100.0, 50.0).unwrap();
//! assert!((world.x - 100.0).abs() < 0.5);
//! assert!((world.y + 50.0).abs() < 0.5);
//! ```

/// Calibrated camera parameters.
pub mod calibration;
/// Time sources for the solver's timeout.
pub mod clock;
/// JSON configuration.
pub mod config;
/// Correction policies.
pub mod corrector;
mod math;
/// Camera model building blocks.
pub mod models;
/// Forward projection capability.
pub mod projector;
/// Convergence controller.
pub mod solver;
/// Plane-to-world mapping.
pub mod transform;

pub use calibration::*;
pub use clock::*;
pub use config::*;
pub use corrector::*;
pub use math::*;
pub use projector::*;
pub use solver::*;
pub use transform::*;
