use crate::{Error, Results};

/// Data from a finished least-squares solve.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub struct Solution<Y, Aux, State> {
    /// The final iterate.
    pub(crate) value: Y,
    /// Why the solve stopped.
    pub(crate) result: Results,
    /// Auxiliary output at the final iterate.
    pub(crate) aux: Aux,
    /// How many steps were taken.
    pub(crate) num_steps: usize,
    /// The solver's final state.
    pub(crate) state: State,
}

impl<Y, Aux, State> Solution<Y, Aux, State> {
    /// The final iterate.
    pub fn value(&self) -> &Y {
        &self.value
    }

    /// Why the solve stopped.
    pub fn result(&self) -> Results {
        self.result
    }

    /// Auxiliary output at the final iterate.
    pub fn aux(&self) -> &Aux {
        &self.aux
    }

    /// How many steps were taken.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// The solver's final state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Did the solve converge?
    pub fn is_successful(&self) -> bool {
        self.result.is_successful()
    }

    /// Take the final iterate.
    pub fn into_value(self) -> Y {
        self.value
    }
}

/// Returned when a solve could not finish, or finished with a failing status and
/// was asked to throw.
#[derive(Debug)]
#[cfg_attr(not(feature = "unstable-exhaustive"), non_exhaustive)]
pub struct FailureOutcome<Y> {
    /// What went wrong.
    pub error: Error,
    /// The last iterate reached.
    pub value: Y,
    /// How many steps were taken before stopping.
    pub num_steps: usize,
}

impl<Y> FailureOutcome<Y> {
    /// What went wrong.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// The last iterate reached.
    pub fn value(&self) -> &Y {
        &self.value
    }

    /// How many steps were taken before stopping.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// The status code behind the failure, if it has one.
    pub fn result(&self) -> Option<Results> {
        self.error.result()
    }
}
