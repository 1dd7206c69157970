//! End-to-end behaviour of the image-to-world solver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vision_positioning::{
    AffineTransform, CalibratedProjector, CalibrationParameters, ForwardProjector,
    ImageToWorldSolver, ManualClock, ProjectionError, ProportionalCorrector, Pt2, Pt3,
    SolveError, SolverOptions, Vec2, VisionPositioning, WorldMapping,
};

fn identity_projector(p: &Pt3) -> Result<Pt2, ProjectionError> {
    Ok(Pt2::new(p.x, p.y))
}

fn plain_mapping() -> WorldMapping {
    WorldMapping {
        offset: Vec2::zeros(),
        inverted_x: false,
        inverted_y: false,
    }
}

type ProjectFn = fn(&Pt3) -> Result<Pt2, ProjectionError>;

/// Full-step corrector: with an identity projector the second guess is exact.
fn exact_solver() -> ImageToWorldSolver<ProjectFn> {
    ImageToWorldSolver::new(identity_projector as ProjectFn)
        .with_corrector(ProportionalCorrector::new(1.0))
        .with_mapping(plain_mapping())
}

#[test]
fn zero_initial_error_is_accepted_on_the_first_iteration() {
    let solver = ImageToWorldSolver::new(identity_projector).with_mapping(plain_mapping());
    let report = solver.solve_with_report(&Pt2::new(0.0, 0.0)).unwrap();
    assert_eq!(report.iterations, 1);
    assert!(report.refined);
    assert_eq!(report.world, Pt2::new(0.0, 0.0));
}

#[test]
fn identity_pipeline_returns_the_pixel() {
    let solver = exact_solver();
    let report = solver.solve_with_report(&Pt2::new(120.0, -35.0)).unwrap();
    assert_eq!(report.iterations, 2);
    assert_eq!(report.world, Pt2::new(120.0, -35.0));
    assert_eq!(report.residual, Vec2::zeros());
}

#[test]
fn offset_is_applied_after_the_transform() {
    let solver =
        exact_solver().with_transform(AffineTransform::scale_translate(2.0, 3.0, 0.0, 0.0));
    let before = solver.solve(4.0, 5.0).unwrap();
    assert_eq!(before, Pt2::new(8.0, 15.0));

    solver.set_world_offset(Vec2::new(10.0, -1.0));
    assert_eq!(solver.world_offset(), Vec2::new(10.0, -1.0));
    let after = solver.solve(4.0, 5.0).unwrap();
    // Offset applied before the transform would give (28, 12).
    assert_eq!(after, Pt2::new(18.0, 14.0));
}

#[test]
fn toggling_inverted_y_only_flips_y() {
    let solver = exact_solver();
    solver.set_world_offset(Vec2::new(1.0, 2.0));

    let upright = solver.solve(30.0, 40.0).unwrap();
    solver.set_inverted_y(true);
    assert!(solver.inverted_y());
    let flipped = solver.solve(30.0, 40.0).unwrap();

    assert_eq!(flipped.x, upright.x);
    assert_eq!(flipped.y, -upright.y);

    solver.set_inverted_x(true);
    let both = solver.solve(30.0, 40.0).unwrap();
    assert_eq!(both, Pt2::new(-31.0, -42.0));
}

#[test]
fn tolerance_shrinks_until_the_break_floor() {
    let solver = ImageToWorldSolver::new(identity_projector)
        .with_clock(ManualClock::new(Duration::from_micros(1)))
        // One microsecond per reading: a stalled loop still hits the timeout.
        .with_mapping(plain_mapping());

    let report = solver.solve_with_report(&Pt2::new(100.0, 50.0)).unwrap();
    assert!(report.refined);
    assert!(report.tolerances.len() > 1);
    for pair in report.tolerances.windows(2) {
        assert!(pair[1] < pair[0], "tolerances not decreasing: {:?}", report.tolerances);
    }
    let last = *report.tolerances.last().unwrap();
    assert!(last <= SolverOptions::default().break_pixel_error);
    assert!(report.residual.x.abs() <= 0.36 && report.residual.y.abs() <= 0.36);

    // Deterministic projector and corrector give a reproducible count.
    let again = solver.solve_with_report(&Pt2::new(100.0, 50.0)).unwrap();
    assert_eq!(again.iterations, report.iterations);
    assert_eq!(again.plane, report.plane);
}

#[test]
fn timeout_reports_the_last_residual() {
    // Prediction always lands 10 px to the right of the guess.
    let biased = |p: &Pt3| -> Result<Pt2, ProjectionError> { Ok(Pt2::new(p.x + 10.0, 1000.0)) };
    let creep = |_: &Vec2, plane: &Pt2| -> Pt2 { *plane + Vec2::new(0.5, 0.0) };
    let solver = ImageToWorldSolver::new(biased)
        .with_corrector(creep)
        .with_clock(ManualClock::new(Duration::from_millis(100)));

    let err = solver.solve(0.0, 0.0).unwrap_err();
    match err {
        SolveError::ConvergenceTimeout {
            residual,
            iterations,
            ..
        } => {
            assert_eq!(iterations, 14);
            // Last projected guess was x = 13 * 0.5.
            assert_eq!(residual, Vec2::new(-16.5, -1000.0));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(err.to_string().contains("final error x: -16.5, y: -1000"));
}

#[test]
fn accepted_once_then_timed_out_still_succeeds() {
    let stuck = |_: &Vec2, plane: &Pt2| -> Pt2 { *plane };
    let solver = ImageToWorldSolver::new(|p: &Pt3| -> Result<Pt2, ProjectionError> {
        Ok(Pt2::new(p.x + 3.0, p.y))
    })
    .with_corrector(stuck)
    .with_clock(ManualClock::new(Duration::from_millis(100)));

    let report = solver.solve_with_report(&Pt2::new(0.0, 0.0)).unwrap();
    assert!(!report.refined);
    assert_eq!(report.tolerances.len(), 1);
    assert_eq!(report.plane, Pt2::origin());
    assert_eq!(report.residual, Vec2::new(-3.0, 0.0));
}

#[test]
fn non_positive_tolerance_fails_before_projecting() {
    let calls = AtomicUsize::new(0);
    let counting = |p: &Pt3| -> Result<Pt2, ProjectionError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Pt2::new(p.x, p.y))
    };
    let solver = ImageToWorldSolver::new(counting);

    for bad in [0.0, -2.5, f64::NAN] {
        solver.set_allowable_error(bad);
        match solver.solve(10.0, 10.0) {
            Err(SolveError::InvalidAllowableError(v)) => {
                assert!(v == bad || (v.is_nan() && bad.is_nan()));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    solver.set_allowable_error(5.0);
    assert!(solver.solve(10.0, 10.0).is_ok());
    assert!(calls.load(Ordering::SeqCst) > 0);
}

#[test]
fn identity_calibration_scenario() {
    let solver = ImageToWorldSolver::configure(CalibrationParameters::identity(), 5.0).unwrap();
    assert!(!solver.inverted_x());
    assert!(solver.inverted_y());
    assert_eq!(solver.world_offset(), Vec2::zeros());

    let world = solver.solve(100.0, 50.0).unwrap();
    assert!((world.x - 100.0).abs() < 0.5, "world={world}");
    assert!((world.y + 50.0).abs() < 0.5, "world={world}");
}

#[test]
fn distorted_camera_recovers_plane_points() {
    let params = CalibrationParameters {
        rotation_vector: [0.01, -0.02, 0.03],
        translation_vector: [-20.0, 10.0, 600.0],
        intrinsic_matrix: [[1200.0, 0.0, 640.0], [0.0, 1190.0, 480.0], [0.0, 0.0, 1.0]],
        distortion_coefficients: vec![-0.12, 0.05, 0.001, -0.0005, 0.0],
    };
    let projector = CalibratedProjector::new(params.clone()).unwrap();
    let solver = ImageToWorldSolver::configure(params, 5.0)
        .unwrap()
        .with_mapping(plain_mapping());

    for target in [Pt2::new(50.0, -30.0), Pt2::new(-80.0, 60.0), Pt2::new(0.0, 0.0)] {
        let pixel = projector
            .project(&Pt3::new(target.x, target.y, 0.0))
            .unwrap();
        let report = solver.solve_with_report(&pixel).unwrap();
        assert!(report.refined, "did not refine for {target}");
        assert!(
            (report.world - target).norm() < 0.5,
            "target={target}, world={}",
            report.world
        );
    }
}

#[test]
fn solve_many_keeps_order_and_isolates_failures() {
    let solver = exact_solver();
    let pixels = [Pt2::new(1.0, 2.0), Pt2::new(f64::NAN, 0.0), Pt2::new(3.0, 4.0)];
    let solver = solver.with_options(SolverOptions {
        timeout_s: 0.05,
        ..Default::default()
    });
    let results = solver.solve_many(&pixels);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], Ok(Pt2::new(1.0, 2.0)));
    assert!(matches!(results[1], Err(SolveError::ConvergenceTimeout { .. })));
    assert_eq!(results[2], Ok(Pt2::new(3.0, 4.0)));
}

#[test]
fn shared_solver_tolerates_live_reconfiguration() {
    let solver = Arc::new(exact_solver());
    let offsets = [Vec2::zeros(), Vec2::new(100.0, 100.0)];

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let solver = Arc::clone(&solver);
            scope.spawn(move || {
                for _ in 0..200 {
                    let world = solver.image_to_world(&Pt2::new(7.0, 9.0)).unwrap();
                    let ok = offsets
                        .iter()
                        .any(|o| (world - (Pt2::new(7.0, 9.0) + *o)).norm() < 1e-9);
                    assert!(ok, "unexpected world {world}");
                }
            });
        }
        for i in 0..200 {
            solver.set_world_offset(offsets[i % 2]);
        }
    });
}
