//! Correction policies that move a virtual-plane guess against the
//! pixel-space residual.

use serde::{Deserialize, Serialize};

use crate::{Pt2, Real, Vec2};

/// Produces the next virtual-plane guess from the current residual.
///
/// `error` is `observed - predicted` in pixels. Implementations are not
/// required to converge; the solver's timeout bounds every solve.
pub trait Corrector {
    fn correct(&self, error: &Vec2, plane: &Pt2) -> Pt2;
}

impl<F> Corrector for F
where
    F: Fn(&Vec2, &Pt2) -> Pt2,
{
    fn correct(&self, error: &Vec2, plane: &Pt2) -> Pt2 {
        self(error, plane)
    }
}

/// Proportional step `plane += error * gain`, independently per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProportionalCorrector {
    pub gain_x: Real,
    pub gain_y: Real,
}

impl ProportionalCorrector {
    pub const DEFAULT_GAIN: Real = 0.03;

    /// Same gain on both axes.
    pub fn new(gain: Real) -> Self {
        Self {
            gain_x: gain,
            gain_y: gain,
        }
    }
}

impl Default for ProportionalCorrector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GAIN)
    }
}

impl Corrector for ProportionalCorrector {
    fn correct(&self, error: &Vec2, plane: &Pt2) -> Pt2 {
        Pt2::new(
            plane.x + error.x * self.gain_x,
            plane.y + error.y * self.gain_y,
        )
    }
}
