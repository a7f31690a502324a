use error_stack::Report;
use gnls_faer::SolverError;

use crate::Results;

/// Errors from setting up or running a least-squares solve.
///
/// Numerical trouble during iteration is normally reported as a [`Results`] status
/// instead. It only becomes an [`Error`] when the caller asked for failures to be
/// thrown.
#[derive(thiserror::Error, Debug)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum Error {
    /// A descent was computed without the vector it acts on.
    #[error("`vector` must be passed to the descent via its options")]
    MissingVector,
    /// A Newton descent was computed without any operator to solve against.
    #[error("At least one of `operator` or `operator_inv` must be passed to `NewtonDescent` via its options")]
    MissingOperator,
    /// A tree did not have the structure it needed.
    #[error("Expected a tree with {expected} leaves, found {actual}")]
    StructureMismatch {
        /// How many leaves were expected.
        expected: usize,
        /// How many leaves there were.
        actual: usize,
    },
    /// The linear solver was called in a way it cannot handle,
    /// e.g. a well-posed solve on a non-square operator.
    #[error("The linear solver was misconfigured: {0:?}")]
    LinearSolverConfig(Report<SolverError>),
    /// A line search ended with a failing status and was asked to throw.
    #[error("The line search failed: {0}")]
    LineSearch(Results),
    /// The solve ended with a failing status and was asked to throw.
    #[error("The solve failed after {num_steps} steps: {result}")]
    Solve {
        /// Why the solve stopped.
        result: Results,
        /// How many steps were taken.
        num_steps: usize,
    },
}

impl Error {
    /// The status code behind this error, if it has one.
    pub fn result(&self) -> Option<Results> {
        match self {
            Self::LineSearch(result) | Self::Solve { result, .. } => Some(*result),
            _ => None,
        }
    }
}
