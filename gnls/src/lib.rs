//! Gauss-Newton solvers for nonlinear least squares.
//!
//! Minimise `sum_squares(r(y, args))` over a structured parameter `y`, given the
//! residual `r` and its Jacobian-vector product. Each step linearizes `r`, solves
//! the linearized problem for a Newton step, and lets a line search decide how
//! much of it to take.
//!
//! ```
//! use gnls::{Config, FnResidual, GaussNewton, least_squares};
//!
//! // Solve y^2 = 2 as a least-squares problem.
//! let f = FnResidual::new(
//!     |y: &f64, _: &()| (y * y - 2.0, ()),
//!     |y: &f64, _: &(), t: &f64| 2.0 * y * t,
//! );
//! let solver = GaussNewton::new(1e-10, 1e-10);
//! let solution = least_squares(&f, &solver, 1.0, &(), Config::default()).unwrap();
//! assert!((solution.value() - 2f64.sqrt()).abs() < 1e-8);
//! ```

pub use crate::descent::{Descent, DescentOptions, NewtonDescent};
pub use crate::error::Error;
pub use crate::function::{FnResidual, ResidualFn, linearize};
pub use crate::line_search::{
    BacktrackingArmijo, LearningRate, LineSearch, LineSearchOptions, LineSearchSolution,
    LineSearchState,
};
pub use crate::linear::{
    FunctionLinearOperator, LinearOperator, LinearSolution, MatrixLinearOperator, Tags,
    linear_solve,
};
pub use crate::norm::{Norm, max_norm, rms_norm, sum_squares, two_norm};
pub use crate::results::Results;
pub use crate::solve_outcome::{FailureOutcome, Solution};
pub use crate::solver::{
    AbstractGaussNewton, Config, GaussNewton, GaussNewtonState, IterativeSolver, least_squares,
};
pub use crate::termination::cauchy_termination;
pub use crate::tree::{Scalar, ShapeDtype, Structure, Tree};
pub use gnls_faer::Strategy;

/// Step directions.
mod descent;
mod error;
/// Residual functions and their linearization.
mod function;
/// Step lengths.
mod line_search;
/// Linear operators and linear solves.
mod linear;
mod norm;
/// Status codes.
mod results;
mod solve_outcome;
/// Iterative solvers and the driver loop.
mod solver;
mod termination;
/// Unit tests
#[cfg(test)]
mod tests;
pub mod tree;
