use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Error, FailureOutcome, Results, Solution, function::ResidualFn, linear::Tags, tree::Tree,
};

pub use gauss_newton::{AbstractGaussNewton, GaussNewton, GaussNewtonState};

mod gauss_newton;

/// An iterative least-squares solver, driven one step at a time by [`least_squares`].
///
/// The driver calls `init` once, then alternates `terminate` and `step` until
/// `terminate` says stop or the step budget runs out.
pub trait IterativeSolver<F, Y, Args>
where
    Y: Tree,
    F: ResidualFn<Y, Args>,
{
    /// Everything the solver carries between steps.
    type State: Clone + std::fmt::Debug;

    /// State before the first step.
    fn init(&self, f: &F, y: &Y, args: &Args, tags: Tags) -> Self::State;

    /// Take one step from `y`. Returns the new iterate, the new state, and the aux
    /// output at the new iterate.
    fn step(
        &self,
        f: &F,
        y: &Y,
        args: &Args,
        state: &Self::State,
        tags: Tags,
    ) -> Result<(Y, Self::State, F::Aux), Error>;

    /// Whether to stop, and with what status.
    fn terminate(
        &self,
        f: &F,
        y: &Y,
        args: &Args,
        state: &Self::State,
        tags: Tags,
    ) -> (bool, Results);

    /// Hook for releasing anything the state holds on to once the solve is over.
    fn buffers(&self, _state: &Self::State) {}
}

/// Configuration for [`least_squares`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Most steps to take before giving up with [`Results::NonlinearMaxStepsReached`].
    pub max_steps: usize,
    /// Return a failing status as an `Err` rather than on the [`Solution`].
    pub throw: bool,
    /// Structural facts about the residual's Jacobian, passed through to the solver.
    pub tags: Tags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_steps: 256,
            throw: true,
            tags: Tags::default(),
        }
    }
}

impl Config {
    /// Set the step budget.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Choose whether a failing status becomes an `Err`.
    pub fn with_throw(mut self, throw: bool) -> Self {
        self.throw = throw;
        self
    }

    /// Set the Jacobian tags.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// Minimise `sum_squares(f(y, args))` over `y`, starting from `y0`.
///
/// On success (or on failure with `config.throw` unset) returns the final iterate,
/// its status and its aux output. Errors carry the last iterate reached.
pub fn least_squares<S, F, Y, Args>(
    f: &F,
    solver: &S,
    y0: Y,
    args: &Args,
    config: Config,
) -> Result<Solution<Y, F::Aux, S::State>, FailureOutcome<Y>>
where
    S: IterativeSolver<F, Y, Args>,
    F: ResidualFn<Y, Args>,
    Y: Tree,
{
    let tags = config.tags;
    let mut state = solver.init(f, &y0, args, tags);
    let mut y = y0;
    let mut aux = None;
    let mut num_steps = 0;

    let result = loop {
        let (done, result) = solver.terminate(f, &y, args, &state, tags);
        if done {
            break result;
        }
        if num_steps >= config.max_steps {
            break Results::NonlinearMaxStepsReached;
        }
        let (new_y, new_state, new_aux) = match solver.step(f, &y, args, &state, tags) {
            Ok(stepped) => stepped,
            Err(error) => {
                warn!(num_steps, %error, "least-squares step failed");
                return Err(FailureOutcome {
                    error,
                    value: y,
                    num_steps,
                });
            }
        };
        y = new_y;
        state = new_state;
        aux = Some(new_aux);
        num_steps += 1;
        debug!(step = num_steps, ?state, "least-squares step");
    };
    solver.buffers(&state);

    if result.is_successful() {
        info!(num_steps, "least-squares solve converged");
    } else {
        warn!(num_steps, %result, "least-squares solve stopped");
        if config.throw {
            return Err(FailureOutcome {
                error: Error::Solve { result, num_steps },
                value: y,
                num_steps,
            });
        }
    }

    let aux = match aux {
        Some(aux) => aux,
        None => f.call(&y, args).1,
    };
    Ok(Solution {
        value: y,
        result,
        aux,
        num_steps,
        state,
    })
}
