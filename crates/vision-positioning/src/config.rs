//! JSON configuration for a complete positioning setup.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParameters;
use crate::corrector::ProportionalCorrector;
use crate::projector::CalibratedProjector;
use crate::solver::{ImageToWorldSolver, SolveError, SolverOptions};
use crate::transform::{AnyTransform, TransformConfig, WorldMapping};

/// Solver type produced by [`PositioningConfig::build`].
pub type ConfiguredSolver =
    ImageToWorldSolver<CalibratedProjector, ProportionalCorrector, AnyTransform>;

/// Calibration, loop tuning and world mapping in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningConfig {
    pub calibration: CalibrationParameters,
    #[serde(default)]
    pub solver: SolverOptions,
    #[serde(default)]
    pub corrector: ProportionalCorrector,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub world: WorldMapping,
}

impl PositioningConfig {
    /// Identity calibration with every other section at its default.
    pub fn template() -> Self {
        Self {
            calibration: CalibrationParameters::identity(),
            solver: SolverOptions::default(),
            corrector: ProportionalCorrector::default(),
            transform: TransformConfig::default(),
            world: WorldMapping::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse positioning config")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&data).with_context(|| format!("in {}", path.display()))
    }

    /// Validate everything and assemble a solver.
    pub fn build(&self) -> Result<ConfiguredSolver, SolveError> {
        self.solver.validate()?;
        let solver = ImageToWorldSolver::configure(
            self.calibration.clone(),
            self.solver.allowable_error,
        )?
        .with_options(self.solver)
        .with_corrector(self.corrector)
        .with_transform(self.transform.build())
        .with_mapping(self.world);
        Ok(solver)
    }
}
