//! Image-to-world positioning by iterative approximation.
//!
//! Distortion-aware forward projection has no closed-form inverse, so the
//! solver searches the virtual calibration plane instead:
//!
//! 1. Start from the plane origin with the configured allowable error.
//! 2. Project the current guess, compute `error = observed - predicted`.
//! 3. If both components are within tolerance, accept the guess and tighten
//!    the tolerance to `max(|ex|, |ey|) - refine_step`. Stop once the
//!    tolerance reaches `break_pixel_error`.
//! 4. Otherwise let the [`Corrector`] produce the next guess.
//! 5. Stop at the timeout. A solve that was never acceptable fails with
//!    [`SolveError::ConvergenceTimeout`]; one that was accepted at least once
//!    returns the last accepted guess.
//!
//! The accepted plane point is mapped through the [`FrameTransform`], then
//! the [`WorldMapping`] offset and axis inversion.
//!
//! # Timing
//!
//! The clock is sampled every `poll_every` iterations, before the
//! projection. A solve can therefore overrun the timeout by at most
//! `poll_every` iterations of projector and corrector work.

use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::calibration::{CalibrationError, CalibrationParameters};
use crate::clock::{Clock, MonotonicClock};
use crate::corrector::{Corrector, ProportionalCorrector};
use crate::projector::{CalibratedProjector, ForwardProjector, ProjectionError};
use crate::transform::{FrameTransform, IdentityTransform, WorldMapping};
use crate::{lift_to_plane, Pt2, Real, Vec2};

/// Errors returned by [`ImageToWorldSolver`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    /// The allowable pixel error must be strictly positive.
    #[error("allowable error must be greater than 0, got {0}")]
    InvalidAllowableError(Real),
    /// A solver option is out of range.
    #[error("invalid solver option `{field}`: {value}")]
    InvalidOption { field: &'static str, value: Real },
    /// No guess became acceptable before the timeout.
    #[error(
        "image to world timed out after {iterations} iterations ({elapsed:?}), final error x: {}, y: {}",
        .residual.x,
        .residual.y
    )]
    ConvergenceTimeout {
        residual: Vec2,
        iterations: usize,
        elapsed: Duration,
    },
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// Tuning of the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Baseline acceptance tolerance in pixels, per axis.
    pub allowable_error: Real,
    /// Refinement stops once the tightened tolerance is at or below this.
    pub break_pixel_error: Real,
    /// Wall-clock bound for one solve, seconds.
    pub timeout_s: Real,
    /// Fixed amount the tolerance shrinks below the accepted error.
    pub refine_step: Real,
    /// Iterations between clock samples.
    pub poll_every: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            allowable_error: 5.0,
            break_pixel_error: 0.25,
            timeout_s: 1.5,
            refine_step: 0.1,
            poll_every: 1,
        }
    }
}

impl SolverOptions {
    /// Check every field except `allowable_error`, which is validated per
    /// solve since it can change at runtime.
    pub fn validate(&self) -> Result<(), SolveError> {
        let invalid = |field, value| Err(SolveError::InvalidOption { field, value });
        if !(self.break_pixel_error.is_finite() && self.break_pixel_error >= 0.0) {
            return invalid("break_pixel_error", self.break_pixel_error);
        }
        if !(self.timeout_s >= 0.0) || self.timeout_s.is_infinite() {
            return invalid("timeout_s", self.timeout_s);
        }
        if !(self.refine_step.is_finite() && self.refine_step > 0.0) {
            return invalid("refine_step", self.refine_step);
        }
        if self.poll_every == 0 {
            return invalid("poll_every", 0.0);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_s).unwrap_or(Duration::MAX)
    }
}

/// Outcome of a successful solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    /// Observed pixel.
    pub pixel: Pt2,
    /// Last accepted virtual-plane point.
    pub plane: Pt2,
    /// World point after transform, offset and inversion.
    pub world: Pt2,
    /// Pixel residual at `plane`.
    pub residual: Vec2,
    pub iterations: usize,
    pub elapsed: Duration,
    /// `true` if refinement reached `break_pixel_error`; `false` if time ran
    /// out while refining an already accepted guess.
    pub refined: bool,
    /// Tolerance after each acceptance, strictly decreasing.
    pub tolerances: Vec<Real>,
}

/// Anything that can turn an observed pixel into a world point.
pub trait VisionPositioning {
    fn image_to_world(&self, pixel: &Pt2) -> Result<Pt2, SolveError>;
}

#[derive(Debug, Clone, Copy)]
struct LiveSettings {
    allowable_error: Real,
    mapping: WorldMapping,
}

/// Iterative image-to-world solver over a pluggable forward projector.
///
/// World offset, axis inversion and the allowable error can be changed
/// through `&self` while other threads are solving. Offset and inversion are
/// read once per solve at the frame-transform step; the allowable error is
/// read once when the solve starts.
pub struct ImageToWorldSolver<
    P,
    C = ProportionalCorrector,
    T = IdentityTransform,
    K = MonotonicClock,
> {
    projector: P,
    corrector: C,
    transform: T,
    clock: K,
    options: SolverOptions,
    live: RwLock<LiveSettings>,
}

impl<P: ForwardProjector> ImageToWorldSolver<P> {
    /// Solver with default options, proportional corrector and identity
    /// transform.
    pub fn new(projector: P) -> Self {
        let options = SolverOptions::default();
        Self {
            projector,
            corrector: ProportionalCorrector::default(),
            transform: IdentityTransform,
            clock: MonotonicClock::new(),
            options,
            live: RwLock::new(LiveSettings {
                allowable_error: options.allowable_error,
                mapping: WorldMapping::default(),
            }),
        }
    }
}

impl ImageToWorldSolver<CalibratedProjector> {
    /// Bind calibration parameters with the given baseline tolerance.
    pub fn configure(
        calibration: CalibrationParameters,
        allowable_error: Real,
    ) -> Result<Self, SolveError> {
        if !(allowable_error > 0.0) {
            return Err(SolveError::InvalidAllowableError(allowable_error));
        }
        let projector = CalibratedProjector::new(calibration)?;
        let solver = Self::new(projector);
        solver.set_allowable_error(allowable_error);
        Ok(solver)
    }
}

impl<P, C, T, K> ImageToWorldSolver<P, C, T, K> {
    pub fn with_corrector<C2: Corrector>(self, corrector: C2) -> ImageToWorldSolver<P, C2, T, K> {
        ImageToWorldSolver {
            projector: self.projector,
            corrector,
            transform: self.transform,
            clock: self.clock,
            options: self.options,
            live: self.live,
        }
    }

    pub fn with_transform<T2: FrameTransform>(
        self,
        transform: T2,
    ) -> ImageToWorldSolver<P, C, T2, K> {
        ImageToWorldSolver {
            projector: self.projector,
            corrector: self.corrector,
            transform,
            clock: self.clock,
            options: self.options,
            live: self.live,
        }
    }

    pub fn with_clock<K2: Clock>(self, clock: K2) -> ImageToWorldSolver<P, C, T, K2> {
        ImageToWorldSolver {
            projector: self.projector,
            corrector: self.corrector,
            transform: self.transform,
            clock,
            options: self.options,
            live: self.live,
        }
    }

    /// Replace the loop options.
    ///
    /// The current allowable error is kept; `options.allowable_error` only
    /// seeds a fresh solver. Use [`Self::set_allowable_error`] to change it.
    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_mapping(mut self, mapping: WorldMapping) -> Self {
        self.live.get_mut().mapping = mapping;
        self
    }

    pub fn projector(&self) -> &P {
        &self.projector
    }

    /// Loop options with the live allowable error.
    pub fn options(&self) -> SolverOptions {
        SolverOptions {
            allowable_error: self.allowable_error(),
            ..self.options
        }
    }

    pub fn world_offset(&self) -> Vec2 {
        self.live.read().mapping.offset
    }

    pub fn set_world_offset(&self, offset: Vec2) {
        self.live.write().mapping.offset = offset;
    }

    pub fn inverted_x(&self) -> bool {
        self.live.read().mapping.inverted_x
    }

    pub fn set_inverted_x(&self, inverted: bool) {
        self.live.write().mapping.inverted_x = inverted;
    }

    pub fn inverted_y(&self) -> bool {
        self.live.read().mapping.inverted_y
    }

    pub fn set_inverted_y(&self, inverted: bool) {
        self.live.write().mapping.inverted_y = inverted;
    }

    pub fn mapping(&self) -> WorldMapping {
        self.live.read().mapping
    }

    pub fn set_mapping(&self, mapping: WorldMapping) {
        self.live.write().mapping = mapping;
    }

    pub fn allowable_error(&self) -> Real {
        self.live.read().allowable_error
    }

    /// Any value is stored; a non-positive one fails the next solve.
    pub fn set_allowable_error(&self, allowable_error: Real) {
        self.live.write().allowable_error = allowable_error;
    }
}

impl<P, C, T, K> ImageToWorldSolver<P, C, T, K>
where
    P: ForwardProjector,
    C: Corrector,
    T: FrameTransform,
    K: Clock,
{
    /// Convert a pixel to world coordinates.
    pub fn solve(&self, pixel_x: Real, pixel_y: Real) -> Result<Pt2, SolveError> {
        self.solve_point(&Pt2::new(pixel_x, pixel_y))
    }

    pub fn solve_point(&self, pixel: &Pt2) -> Result<Pt2, SolveError> {
        self.solve_with_report(pixel).map(|report| report.world)
    }

    /// Solve each pixel independently.
    pub fn solve_many(&self, pixels: &[Pt2]) -> Vec<Result<Pt2, SolveError>> {
        pixels.iter().map(|px| self.solve_point(px)).collect()
    }

    /// Solve and return loop diagnostics alongside the world point.
    pub fn solve_with_report(&self, pixel: &Pt2) -> Result<SolveReport, SolveError> {
        let allowable_error = self.allowable_error();
        if !(allowable_error > 0.0) {
            return Err(SolveError::InvalidAllowableError(allowable_error));
        }
        self.options.validate()?;

        let timeout = self.options.timeout();
        let poll_every = self.options.poll_every;
        debug!(
            px = pixel.x,
            py = pixel.y,
            allowable_error,
            ?timeout,
            "image to world solve"
        );

        let start = self.clock.now();
        let mut plane = Pt2::origin();
        let mut tolerance = allowable_error;
        let mut residual = Vec2::zeros();
        let mut accepted: Option<(Pt2, Vec2)> = None;
        let mut tolerances = Vec::new();
        let mut iterations = 0usize;
        let mut refined = false;

        loop {
            if iterations % poll_every == 0
                && self.clock.now().saturating_sub(start) >= timeout
            {
                break;
            }
            iterations += 1;

            let predicted = self.projector.project(&lift_to_plane(&plane))?;
            residual = *pixel - predicted;
            trace!(
                iteration = iterations,
                ex = residual.x,
                ey = residual.y,
                tolerance,
                "iteration"
            );

            if residual.x.abs() <= tolerance && residual.y.abs() <= tolerance {
                accepted = Some((plane, residual));
                tolerance = residual.x.abs().max(residual.y.abs()) - self.options.refine_step;
                tolerances.push(tolerance);
                debug!(iteration = iterations, tolerance, "guess accepted");
                if tolerance <= self.options.break_pixel_error {
                    refined = true;
                    break;
                }
            } else {
                plane = self.corrector.correct(&residual, &plane);
            }
        }
        let elapsed = self.clock.now().saturating_sub(start);

        let Some((plane, accepted_residual)) = accepted else {
            warn!(
                iterations,
                ex = residual.x,
                ey = residual.y,
                ?elapsed,
                "image to world timed out"
            );
            return Err(SolveError::ConvergenceTimeout {
                residual,
                iterations,
                elapsed,
            });
        };

        let mapping = self.mapping();
        let world = mapping.apply(&self.transform.apply(&plane));
        debug!(
            iterations,
            refined,
            wx = world.x,
            wy = world.y,
            "image to world solved"
        );

        Ok(SolveReport {
            pixel: *pixel,
            plane,
            world,
            residual: accepted_residual,
            iterations,
            elapsed,
            refined,
            tolerances,
        })
    }
}

impl<P, C, T, K> VisionPositioning for ImageToWorldSolver<P, C, T, K>
where
    P: ForwardProjector,
    C: Corrector,
    T: FrameTransform,
    K: Clock,
{
    fn image_to_world(&self, pixel: &Pt2) -> Result<Pt2, SolveError> {
        self.solve_point(pixel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::Pt3;

    fn identity(p: &Pt3) -> Result<Pt2, ProjectionError> {
        Ok(Pt2::new(p.x, p.y))
    }

    fn halving(error: &Vec2, plane: &Pt2) -> Pt2 {
        *plane + *error * 0.5
    }

    #[test]
    fn options_validation() {
        assert!(SolverOptions::default().validate().is_ok());

        let bad = SolverOptions {
            refine_step: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(SolveError::InvalidOption {
                field: "refine_step",
                ..
            })
        ));

        let bad = SolverOptions {
            poll_every: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = SolverOptions {
            timeout_s: f64::NAN,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn options_json_fills_defaults() {
        let opts: SolverOptions = serde_json::from_str(r#"{ "timeout_s": 0.5 }"#).unwrap();
        assert_eq!(opts.timeout(), Duration::from_millis(500));
        assert_eq!(opts.allowable_error, 5.0);
        assert_eq!(opts.break_pixel_error, 0.25);
    }

    #[test]
    fn halving_corrector_refines_in_a_known_number_of_steps() {
        let solver = ImageToWorldSolver::new(identity)
            .with_corrector(halving)
            .with_clock(ManualClock::new(Duration::from_micros(1)))
            .with_mapping(WorldMapping {
                inverted_y: false,
                ..Default::default()
            });

        let report = solver.solve_with_report(&Pt2::new(8.0, 0.0)).unwrap();
        assert_eq!(report.iterations, 10);
        assert!(report.refined);
        assert_eq!(report.plane, Pt2::new(7.75, 0.0));
        assert_eq!(report.world, Pt2::new(7.75, 0.0));
        assert_eq!(report.residual, Vec2::new(0.25, 0.0));

        let expected = [3.9, 1.9, 0.9, 0.4, 0.15];
        assert_eq!(report.tolerances.len(), expected.len());
        for (got, want) in report.tolerances.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }

    #[test]
    fn timeout_counts_polls_exactly() {
        let far = |_: &Pt3| -> Result<Pt2, ProjectionError> { Ok(Pt2::new(1000.0, 1000.0)) };
        let solver =
            ImageToWorldSolver::new(far).with_clock(ManualClock::new(Duration::from_millis(100)));

        match solver.solve(0.0, 0.0) {
            Err(SolveError::ConvergenceTimeout {
                residual,
                iterations,
                elapsed,
            }) => {
                assert_eq!(iterations, 14);
                assert_eq!(residual, Vec2::new(-1000.0, -1000.0));
                assert!(elapsed >= Duration::from_millis(1500));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn coarse_polling_trades_slack_for_fewer_clock_reads() {
        let far = |_: &Pt3| -> Result<Pt2, ProjectionError> { Ok(Pt2::new(1000.0, 0.0)) };
        let solver = ImageToWorldSolver::new(far)
            .with_clock(ManualClock::new(Duration::from_millis(100)))
            .with_options(SolverOptions {
                poll_every: 4,
                ..Default::default()
            });

        let err = solver.solve(0.0, 0.0).unwrap_err();
        // Polls at iterations 0, 4, 8, ... read 100 ms, 200 ms, ...
        assert!(matches!(
            err,
            SolveError::ConvergenceTimeout {
                iterations: 56,
                ..
            }
        ));
    }

    #[test]
    fn zero_timeout_fails_without_projecting() {
        let solver = ImageToWorldSolver::new(|_: &Pt3| -> Result<Pt2, ProjectionError> {
            panic!("projector must not run")
        })
        .with_options(SolverOptions {
            timeout_s: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            solver.solve(1.0, 1.0),
            Err(SolveError::ConvergenceTimeout { iterations: 0, .. })
        ));
    }

    #[test]
    fn projector_errors_propagate_unchanged() {
        let failing = |_: &Pt3| -> Result<Pt2, ProjectionError> {
            Err(ProjectionError::BehindCamera { z: -1.0 })
        };
        let solver = ImageToWorldSolver::new(failing);
        assert_eq!(
            solver.solve(1.0, 2.0),
            Err(SolveError::Projection(ProjectionError::BehindCamera {
                z: -1.0
            }))
        );
    }

    #[test]
    fn configure_rejects_non_positive_tolerance() {
        let err = ImageToWorldSolver::configure(CalibrationParameters::identity(), 0.0)
            .err()
            .expect("zero tolerance is a configuration error");
        assert_eq!(err, SolveError::InvalidAllowableError(0.0));

        let solver = ImageToWorldSolver::configure(CalibrationParameters::identity(), 2.0).unwrap();
        assert_eq!(solver.allowable_error(), 2.0);
    }

    #[test]
    fn configured_tolerance_survives_option_changes() {
        let solver = ImageToWorldSolver::configure(CalibrationParameters::identity(), 2.0)
            .unwrap()
            .with_options(SolverOptions {
                timeout_s: 0.5,
                ..Default::default()
            });
        assert_eq!(solver.allowable_error(), 2.0);
        assert_eq!(solver.options().allowable_error, 2.0);
        assert_eq!(solver.options().timeout_s, 0.5);

        solver.set_allowable_error(3.5);
        assert_eq!(solver.options().allowable_error, 3.5);
    }
}
