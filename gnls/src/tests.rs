use std::collections::BTreeMap;

use super::*;


pub(crate) fn assert_nearly_eq(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

/// Residual of `y = a * exp(b * t)` against data generated with a = 2, b = -0.5.
fn exponential_fit() -> FnResidual<
    impl Fn(&[f64; 2], &Vec<f64>) -> (Vec<f64>, f64),
    impl Fn(&[f64; 2], &Vec<f64>, &[f64; 2]) -> Vec<f64>,
> {
    FnResidual::new(
        |y: &[f64; 2], ts: &Vec<f64>| {
            let r: Vec<f64> = ts
                .iter()
                .map(|t| y[0] * (y[1] * t).exp() - 2.0 * (-0.5 * t).exp())
                .collect();
            let ss = sum_squares(&r);
            (r, ss)
        },
        |y: &[f64; 2], ts: &Vec<f64>, dy: &[f64; 2]| {
            ts.iter()
                .map(|t| {
                    let e = (y[1] * t).exp();
                    e * dy[0] + y[0] * t * e * dy[1]
                })
                .collect()
        },
    )
}

fn sample_times() -> Vec<f64> {
    (0..10).map(|i| i as f64 * 0.5).collect()
}

#[test]
fn fits_exponential_curve() {
    let f = exponential_fit();
    let solver = GaussNewton::new(1e-10, 1e-10).with_line_search(BacktrackingArmijo::default());
    let solution = least_squares(&f, &solver, [1.5, -0.3], &sample_times(), Config::default())
        .expect("should converge");
    assert!(solution.is_successful());
    assert_nearly_eq(solution.value()[0], 2.0);
    assert_nearly_eq(solution.value()[1], -0.5);
    // Aux is the objective at the final iterate.
    assert!(*solution.aux() < 1e-12);
    assert!(solution.num_steps() > 1);
}

#[test]
fn rosenbrock_with_full_newton_steps() {
    let f = FnResidual::new(
        |y: &[f64; 2], _: &()| ([10.0 * (y[1] - y[0] * y[0]), 1.0 - y[0]], ()),
        |y: &[f64; 2], _: &(), t: &[f64; 2]| [10.0 * (t[1] - 2.0 * y[0] * t[0]), -t[0]],
    );
    let solver = GaussNewton::new(1e-10, 1e-10);
    let solution =
        least_squares(&f, &solver, [-1.2, 1.0], &(), Config::default()).expect("should converge");
    assert_nearly_eq(solution.value()[0], 1.0);
    assert_nearly_eq(solution.value()[1], 1.0);
    assert_eq!(solution.result(), Results::Successful);
}

#[test]
fn overdetermined_linear_fit() {
    // Least-squares line through (0, 1), (1, 2), (2, 2), (3, 4): intercept 0.9, slope 0.9.
    let points = [(0.0, 1.0), (1.0, 2.0), (2.0, 2.0), (3.0, 4.0)];
    let f = FnResidual::new(
        |y: &(f64, f64), pts: &[(f64, f64); 4]| {
            let r: Vec<f64> = pts.iter().map(|(t, d)| y.0 + y.1 * t - d).collect();
            (r, ())
        },
        |_: &(f64, f64), pts: &[(f64, f64); 4], dy: &(f64, f64)| {
            pts.iter().map(|(t, _)| dy.0 + dy.1 * t).collect::<Vec<f64>>()
        },
    );
    let solver = GaussNewton::new(1e-8, 1e-8);
    let solution =
        least_squares(&f, &solver, (0.0, 0.0), &points, Config::default()).expect("converges");
    let (intercept, slope) = *solution.value();
    assert_nearly_eq(intercept, 0.9);
    assert_nearly_eq(slope, 0.9);
    // One step to get there, one to see the iterate stop moving,
    // one more for the objective to stop moving too.
    assert_eq!(solution.num_steps(), 3);

    let state = solution.state();
    assert_nearly_eq(state.f_val(), 0.7);
    assert_nearly_eq(state.f_prev(), 0.7);
}

#[test]
fn structured_parameters() {
    // Solve for named parameters: gain * 3 = 6, offset + gain = 5.
    let f = FnResidual::new(
        |y: &BTreeMap<&'static str, f64>, _: &()| {
            (vec![y["gain"] * 3.0 - 6.0, y["offset"] + y["gain"] - 5.0], ())
        },
        |_: &BTreeMap<&'static str, f64>, _: &(), t: &BTreeMap<&'static str, f64>| {
            vec![t["gain"] * 3.0, t["offset"] + t["gain"]]
        },
    );
    let y0 = BTreeMap::from([("gain", 0.0), ("offset", 0.0)]);
    let solver = GaussNewton::new(1e-8, 1e-8);
    let solution = least_squares(&f, &solver, y0, &(), Config::default()).expect("converges");
    assert_nearly_eq(solution.value()["gain"], 2.0);
    assert_nearly_eq(solution.value()["offset"], 3.0);
}

fn rank_deficient() -> impl ResidualFn<Vec<f64>, (), Out = Vec<f64>, Aux = ()> {
    // Only y0 + y1 matters.
    FnResidual::new(
        |y: &Vec<f64>, _: &()| (vec![y[0] + y[1] - 1.0, 2.0 * (y[0] + y[1]) - 2.0], ()),
        |_: &Vec<f64>, _: &(), t: &Vec<f64>| vec![t[0] + t[1], 2.0 * (t[0] + t[1])],
    )
}

#[test]
fn singular_jacobian_stops_the_solve() {
    let f = rank_deficient();
    let solver = GaussNewton::new(1e-8, 1e-8).with_linear_solver(Strategy::Lu);

    let config = Config::default().with_throw(false);
    let solution = least_squares(&f, &solver, vec![0.0, 0.0], &(), config).expect("no throw");
    assert_eq!(solution.result(), Results::Singular);
    assert_eq!(solution.num_steps(), 1);
    assert_eq!(solution.value(), &vec![0.0, 0.0]);

    let failure = least_squares(&f, &solver, vec![0.0, 0.0], &(), Config::default())
        .expect_err("should throw");
    assert!(matches!(
        failure.error(),
        Error::Solve {
            result: Results::Singular,
            num_steps: 1
        }
    ));
    assert_eq!(failure.result(), Some(Results::Singular));
    assert_eq!(failure.value(), &vec![0.0, 0.0]);
}

#[test]
fn svd_handles_rank_deficient_jacobian() {
    let f = rank_deficient();
    let solver = GaussNewton::new(1e-8, 1e-8).with_linear_solver(Strategy::Svd);
    let solution =
        least_squares(&f, &solver, vec![0.0, 0.0], &(), Config::default()).expect("converges");
    // Minimum-norm step from the origin.
    assert_nearly_eq(solution.value()[0], 0.5);
    assert_nearly_eq(solution.value()[1], 0.5);
}

#[test]
fn non_finite_jacobian_is_reported() {
    let f = FnResidual::new(
        |y: &f64, _: &()| (*y, ()),
        |_: &f64, _: &(), _: &f64| f64::NAN,
    );
    let solver = GaussNewton::new(1e-8, 1e-8);
    let config = Config::default().with_throw(false);
    let solution = least_squares(&f, &solver, 1.0, &(), config).expect("no throw");
    assert_eq!(solution.result(), Results::NonFiniteInput);
    assert_eq!(*solution.value(), 1.0);
}

#[test]
fn nearly_singular_jacobian_with_default_solver() {
    // The rows are proportional, so the square Jacobian is singular even though
    // LU only sees a rounding-level pivot.
    let f = FnResidual::new(
        |y: &[f64; 2], _: &()| {
            (
                [0.1 * y[0] + 0.2 * y[1] - 1.0, 0.3 * y[0] + 0.6 * y[1] - 2.0],
                (),
            )
        },
        |_: &[f64; 2], _: &(), t: &[f64; 2]| {
            [0.1 * t[0] + 0.2 * t[1], 0.3 * t[0] + 0.6 * t[1]]
        },
    );
    let solver = GaussNewton::new(1e-8, 1e-8);
    let config = Config::default().with_throw(false);
    let solution = least_squares(&f, &solver, [0.0, 0.0], &(), config).expect("no throw");
    assert_eq!(solution.result(), Results::Singular);
    assert_eq!(solution.num_steps(), 1);
    assert_eq!(*solution.value(), [0.0, 0.0]);
}

#[test]
fn non_finite_residual_is_reported() {
    let f = FnResidual::new(
        |_: &f64, _: &()| (f64::NAN, ()),
        |_: &f64, _: &(), t: &f64| *t,
    );
    let solver = GaussNewton::new(1e-8, 1e-8);
    let config = Config::default().with_throw(false);
    let solution = least_squares(&f, &solver, 1.0, &(), config).expect("no throw");
    assert_eq!(solution.result(), Results::NonFiniteInput);
    assert_eq!(solution.num_steps(), 1);
    assert_eq!(*solution.value(), 1.0);
}

#[test]
fn running_out_of_steps() {
    let f = exponential_fit();
    let solver = GaussNewton::new(1e-10, 1e-10);
    let config = Config::default().with_max_steps(1).with_throw(false);
    let solution = least_squares(&f, &solver, [1.5, -0.3], &sample_times(), config)
        .expect("no throw");
    assert_eq!(solution.result(), Results::NonlinearMaxStepsReached);
    assert_eq!(solution.num_steps(), 1);

    let config = Config::default().with_max_steps(1);
    let failure = least_squares(&f, &solver, [1.5, -0.3], &sample_times(), config)
        .expect_err("should throw");
    assert!(matches!(
        failure.error(),
        Error::Solve {
            result: Results::NonlinearMaxStepsReached,
            num_steps: 1
        }
    ));
    assert_eq!(failure.num_steps(), 1);
}

#[test]
fn zero_steps_still_reports_aux() {
    let f = exponential_fit();
    let solver = GaussNewton::new(1e-10, 1e-10);
    let config = Config::default().with_max_steps(0).with_throw(false);
    let y0 = [1.5, -0.3];
    let solution = least_squares(&f, &solver, y0, &sample_times(), config).expect("no throw");
    assert_eq!(solution.num_steps(), 0);
    assert_eq!(solution.value(), &y0);
    let (_, expected_aux) = f.call(&y0, &sample_times());
    assert_nearly_eq(*solution.aux(), expected_aux);
}

#[test]
fn aux_matches_final_iterate() {
    let f = exponential_fit();
    let solver = GaussNewton::new(1e-10, 1e-10).with_line_search(BacktrackingArmijo::default());
    let config = Config::default().with_max_steps(3).with_throw(false);
    let solution = least_squares(&f, &solver, [1.5, -0.3], &sample_times(), config)
        .expect("no throw");
    let (_, aux_at_value) = f.call(solution.value(), &sample_times());
    assert_nearly_eq(*solution.aux(), aux_at_value);
}

#[test]
fn misconfigured_linear_solver_is_an_error() {
    let f = exponential_fit();
    let solver = GaussNewton::new(1e-10, 1e-10).with_linear_solver(Strategy::Auto {
        well_posed: Some(true),
    });
    let failure = least_squares(&f, &solver, [1.5, -0.3], &sample_times(), Config::default())
        .expect_err("ten residuals, two parameters");
    assert!(matches!(failure.error(), Error::LinearSolverConfig(_)));
    assert_eq!(failure.num_steps(), 0);
    assert_eq!(failure.value(), &[1.5, -0.3]);
    assert_eq!(failure.result(), None);
}

#[test]
fn config_serde() {
    let config = Config::default()
        .with_max_steps(10)
        .with_throw(false)
        .with_tags(Tags::symmetric_psd());
    let json = serde_json::to_string(&config).unwrap();
    let back: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);

    let defaults: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, Config::default());
    assert_eq!(defaults.max_steps, 256);
    assert!(defaults.throw);
}

#[test]
fn custom_solver_through_the_driver() {
    // A solver that halves y each step and stops once |y| < 1.
    struct Halving;

    impl<F: ResidualFn<f64, ()>> IterativeSolver<F, f64, ()> for Halving {
        type State = u32;

        fn init(&self, _f: &F, _y: &f64, _args: &(), _tags: Tags) -> u32 {
            0
        }

        fn step(
            &self,
            f: &F,
            y: &f64,
            args: &(),
            state: &u32,
            _tags: Tags,
        ) -> Result<(f64, u32, F::Aux), Error> {
            let y = y / 2.0;
            Ok((y, state + 1, f.call(&y, args).1))
        }

        fn terminate(&self, _f: &F, y: &f64, _args: &(), _state: &u32, _tags: Tags) -> (bool, Results) {
            (y.abs() < 1.0, Results::Successful)
        }
    }

    let f = FnResidual::new(|y: &f64, _: &()| (*y, *y), |_: &f64, _: &(), t: &f64| *t);
    let solution = least_squares(&f, &Halving, 8.0, &(), Config::default()).expect("converges");
    assert_eq!(*solution.value(), 0.5);
    assert_eq!(*solution.state(), 4);
    assert_eq!(*solution.aux(), 0.5);
}

fn offset_from(target: [f64; 3]) -> impl ResidualFn<[f64; 3], (), Out = [f64; 3], Aux = ()> {
    FnResidual::new(
        move |y: &[f64; 3], _: &()| (y.sub(&target), ()),
        |_: &[f64; 3], _: &(), t: &[f64; 3]| *t,
    )
}

#[test]
fn quadratic_bowl_end_to_end() {
    let f = offset_from([1.0, 2.0, 3.0]);
    let solver = GaussNewton::new(1e-6, 1e-6);
    let solution =
        least_squares(&f, &solver, [0.0; 3], &(), Config::default()).expect("converges");
    assert_eq!(solution.result(), Results::Successful);
    assert_eq!(solution.value(), &[1.0, 2.0, 3.0]);
    // Reached on the first step; the objective history needs two more to settle.
    assert_eq!(solution.num_steps(), 3);
}

#[test]
fn one_full_step_reaches_a_linear_target() {
    let f = FnResidual::new(|y: &f64, _: &()| (y - 4.5, ()), |_: &f64, _: &(), t: &f64| *t);
    let solver = GaussNewton::new(1e-6, 1e-6);
    let state = solver.init(&f, &0.0, &(), Tags::default());
    let (y1, state, ()) = solver
        .step(&f, &0.0, &(), &state, Tags::default())
        .expect("step");
    assert_eq!(y1, 4.5);
    assert_eq!(*state.diff(), 4.5);
    assert_eq!(state.step_size(), 1.0);
}

#[test]
fn zero_residual_start_converges_without_moving() {
    let f = offset_from([1.0, 2.0, 3.0]);
    let solver = GaussNewton::new(1e-6, 1e-6);
    let solution =
        least_squares(&f, &solver, [1.0, 2.0, 3.0], &(), Config::default()).expect("converges");
    assert_eq!(solution.value(), &[1.0, 2.0, 3.0]);
    assert_eq!(solution.state().diff(), &[0.0; 3]);
    assert_eq!(solution.state().f_val(), 0.0);
    assert_eq!(solution.state().f_prev(), 0.0);
    assert_eq!(solution.num_steps(), 2);
}

#[test]
fn converged_point_is_a_fixed_point() {
    let f = offset_from([1.0, 2.0, 3.0]);
    let solver = GaussNewton::new(1e-6, 1e-6);
    let solution =
        least_squares(&f, &solver, [0.0; 3], &(), Config::default()).expect("converges");
    let (done, result) = solver.terminate(
        &f,
        solution.value(),
        &(),
        solution.state(),
        Tags::default(),
    );
    assert!(done);
    assert!(result.is_successful());

    let (y, state, ()) = solver
        .step(&f, solution.value(), &(), solution.state(), Tags::default())
        .expect("step");
    assert_eq!(&y, solution.value());
    assert_eq!(state.diff(), &[0.0; 3]);
}
