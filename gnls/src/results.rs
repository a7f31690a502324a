use std::fmt::{self, Display, Formatter};

use gnls_faer::SolverError;

/// How an iterative solve, a descent or a line search ended.
///
/// Variants are ordered by severity, so a more specific failure always outranks a
/// generic one when statuses are combined with [`Results::promote`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub enum Results {
    /// Everything went fine.
    #[default]
    Successful,
    /// Ran out of steps before converging.
    NonlinearMaxStepsReached,
    /// No acceptable step size was found.
    LineSearchFailed,
    /// A linear solve hit a singular (or numerically singular) operator.
    Singular,
    /// A matrix decomposition broke down, e.g. Cholesky on an indefinite matrix.
    Breakdown,
    /// NaN or infinity reached a linear solve.
    NonFiniteInput,
}

impl Results {
    /// Is this [`Results::Successful`]?
    pub fn is_successful(self) -> bool {
        self == Self::Successful
    }

    /// Combine two statuses, keeping whichever is more severe.
    pub fn promote(self, other: Self) -> Self {
        self.max(other)
    }

    /// Pick `if_true` when `condition` holds, else `if_false`.
    pub fn select(condition: bool, if_true: Self, if_false: Self) -> Self {
        if condition { if_true } else { if_false }
    }

    /// Status for a failed linear solve.
    ///
    /// Returns `None` when the failure came from how the solver was called rather
    /// than from the numbers, since that is a programming error, not a status.
    pub fn from_linear_error(error: SolverError) -> Option<Self> {
        if !error.is_numerical() {
            return None;
        }
        Some(match error {
            SolverError::Singular => Self::Singular,
            SolverError::NonFiniteInput => Self::NonFiniteInput,
            _ => Self::Breakdown,
        })
    }

    /// Human-readable description.
    #[mutants::skip]
    pub fn message(self) -> &'static str {
        match self {
            Self::Successful => "",
            Self::NonlinearMaxStepsReached => {
                "The maximum number of steps was reached in the nonlinear solver. \
                 The problem may not be solveable (e.g., a root-find on a function that \
                 has no roots), or you may need to increase `max_steps`."
            }
            Self::LineSearchFailed => "The line search could not find a step that decreased the objective.",
            Self::Singular => "A linear solve encountered a singular operator.",
            Self::Breakdown => "A matrix decomposition broke down during a linear solve.",
            Self::NonFiniteInput => "A linear solve was given NaN or infinite input.",
        }
    }
}

impl Display for Results {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Successful => f.write_str("successful"),
            other => f.write_str(other.message()),
        }
    }
}
