//! Line searches: how far to go along a descent.

use serde::{Deserialize, Serialize};

use crate::{
    Error, Results,
    descent::{Descent, DescentOptions},
    linear::LinearOperator,
    tree::{Scalar, Tree, dot_leaves},
};

/// What a line search is told about the current iterate.
pub struct LineSearchOptions<'a, Y: Tree, Out: Tree, Aux> {
    /// Step size to start searching from.
    pub init_step_size: Scalar,
    /// Residual (Gauss-Newton) or gradient at the current iterate.
    pub vector: &'a Out,
    /// Jacobian (Gauss-Newton) or Hessian at the current iterate.
    pub operator: Option<&'a dyn LinearOperator<Y, Out>>,
    /// Inverse of `operator`, if already known.
    pub operator_inv: Option<&'a dyn LinearOperator<Out, Y>>,
    /// Objective value at the current iterate.
    pub f0: Scalar,
    /// Auxiliary output at the current iterate.
    pub aux: &'a Aux,
    /// Whether `vector`/`operator` are a residual and Jacobian.
    pub gauss_newton: bool,
}

impl<'a, Y: Tree, Out: Tree, Aux> LineSearchOptions<'a, Y, Out, Aux> {
    /// The subset of these options a [`Descent`] needs.
    pub fn descent_options(&self) -> DescentOptions<'a, Y, Out> {
        DescentOptions {
            vector: Some(self.vector),
            operator: self.operator,
            operator_inv: self.operator_inv,
            gauss_newton: self.gauss_newton,
        }
    }

    /// Predicted change in the objective when stepping by `diff`, to first order.
    ///
    /// `None` when there is no way to tell.
    fn predicted_decrease(&self, diff: &Y) -> Option<Scalar> {
        if self.gauss_newton {
            // d/dt |r(y + t diff)|^2 at t = 0.
            let operator = self.operator?;
            Some(2.0 * self.vector.dot(&operator.mv(diff)))
        } else {
            Some(dot_leaves(&self.vector.leaves(), &diff.leaves()))
        }
    }
}

/// Carried from one line search to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSearchState {
    /// Step size the next search should start from.
    pub next_init: Scalar,
    /// How many trial steps this search evaluated.
    pub num_steps: usize,
}

/// Outcome of one line search.
#[derive(Debug, Clone)]
pub struct LineSearchSolution<Y, Aux> {
    /// The accepted iterate.
    pub value: Y,
    /// Status of the search.
    pub result: Results,
    /// State for the next search.
    pub state: LineSearchState,
    /// Auxiliary output at `value`.
    pub aux: Aux,
}

/// Chooses a step size along a [`Descent`] and returns the resulting iterate.
pub trait LineSearch {
    /// Search from `y`.
    ///
    /// `objective` returns the objective value and auxiliary output at a trial point.
    /// When `throw` is set, a failing status is returned as [`Error::LineSearch`]
    /// instead of on the solution.
    fn search<Y, Out, Aux, O, D>(
        &self,
        objective: O,
        descent: &D,
        y: &Y,
        options: &LineSearchOptions<'_, Y, Out, Aux>,
        throw: bool,
    ) -> Result<LineSearchSolution<Y, Aux>, Error>
    where
        Y: Tree,
        Out: Tree,
        Aux: Clone,
        O: Fn(&Y) -> (Scalar, Aux),
        D: Descent;
}

fn finish<Y, Aux>(
    solution: LineSearchSolution<Y, Aux>,
    throw: bool,
) -> Result<LineSearchSolution<Y, Aux>, Error> {
    if throw && !solution.result.is_successful() {
        return Err(Error::LineSearch(solution.result));
    }
    Ok(solution)
}

fn stay_put<Y: Tree, Out: Tree, Aux: Clone>(
    y: &Y,
    options: &LineSearchOptions<'_, Y, Out, Aux>,
    result: Results,
    num_steps: usize,
) -> LineSearchSolution<Y, Aux> {
    LineSearchSolution {
        value: y.clone(),
        result,
        state: LineSearchState {
            next_init: options.init_step_size,
            num_steps,
        },
        aux: options.aux.clone(),
    }
}

/// Always take one step of a fixed size.
///
/// Ignores `init_step_size`. Evaluates the objective once, only for its aux output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRate {
    /// The fixed step size.
    pub learning_rate: Scalar,
}

impl LearningRate {
    /// A fixed step size.
    pub fn new(learning_rate: Scalar) -> Self {
        Self { learning_rate }
    }
}

impl Default for LearningRate {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LineSearch for LearningRate {
    fn search<Y, Out, Aux, O, D>(
        &self,
        objective: O,
        descent: &D,
        y: &Y,
        options: &LineSearchOptions<'_, Y, Out, Aux>,
        throw: bool,
    ) -> Result<LineSearchSolution<Y, Aux>, Error>
    where
        Y: Tree,
        Out: Tree,
        Aux: Clone,
        O: Fn(&Y) -> (Scalar, Aux),
        D: Descent,
    {
        let (diff, result) = descent.compute(self.learning_rate, &options.descent_options())?;
        if !result.is_successful() {
            return finish(stay_put(y, options, result, 1), throw);
        }
        let value = y.add(&diff);
        let (_, aux) = objective(&value);
        let solution = LineSearchSolution {
            value,
            result,
            state: LineSearchState {
                next_init: self.learning_rate,
                num_steps: 1,
            },
            aux,
        };
        finish(solution, throw)
    }
}

/// Backtracking line search with the Armijo sufficient-decrease condition.
///
/// Starting from the options' `init_step_size`, shrinks the step by
/// `decrease_factor` until `f(y + diff) <= f0 + slope * D(diff)`, where `D` is the
/// first-order predicted change of the objective. If the very first trial is
/// accepted, the next search starts from a larger step, capped at `step_init`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktrackingArmijo {
    /// Multiplies the step size after each rejected trial. In `(0, 1)`.
    pub decrease_factor: Scalar,
    /// Fraction of the predicted decrease a step must achieve. In `(0, 1)`.
    pub slope: Scalar,
    /// Largest step size a search will start from.
    pub step_init: Scalar,
    /// Trials per search before giving up.
    pub max_steps: usize,
}

impl Default for BacktrackingArmijo {
    fn default() -> Self {
        Self {
            decrease_factor: 0.5,
            slope: 0.1,
            step_init: 1.0,
            max_steps: 20,
        }
    }
}

struct Trial<Y, Aux> {
    value: Y,
    f: Scalar,
    aux: Aux,
    step_size: Scalar,
}

impl LineSearch for BacktrackingArmijo {
    fn search<Y, Out, Aux, O, D>(
        &self,
        objective: O,
        descent: &D,
        y: &Y,
        options: &LineSearchOptions<'_, Y, Out, Aux>,
        throw: bool,
    ) -> Result<LineSearchSolution<Y, Aux>, Error>
    where
        Y: Tree,
        Out: Tree,
        Aux: Clone,
        O: Fn(&Y) -> (Scalar, Aux),
        D: Descent,
    {
        if !options.f0.is_finite() {
            return finish(stay_put(y, options, Results::LineSearchFailed, 0), throw);
        }
        let descent_options = options.descent_options();
        let mut step_size = options.init_step_size;
        let mut best: Option<Trial<Y, Aux>> = None;

        for trial in 0..self.max_steps {
            let (diff, result) = descent.compute(step_size, &descent_options)?;
            if !result.is_successful() {
                return finish(stay_put(y, options, result, trial + 1), throw);
            }
            let candidate = y.add(&diff);
            let (f, aux) = objective(&candidate);
            if f.is_finite() {
                let accept = match options.predicted_decrease(&diff) {
                    Some(decrease) => f <= options.f0 + self.slope * decrease,
                    None => f < options.f0,
                };
                if accept {
                    let next_init = if trial == 0 {
                        libm::fmin(step_size / self.decrease_factor, self.step_init)
                    } else {
                        step_size
                    };
                    let solution = LineSearchSolution {
                        value: candidate,
                        result: Results::Successful,
                        state: LineSearchState {
                            next_init,
                            num_steps: trial + 1,
                        },
                        aux,
                    };
                    return finish(solution, throw);
                }
                if best.as_ref().is_none_or(|b| f < b.f) {
                    best = Some(Trial {
                        value: candidate,
                        f,
                        aux,
                        step_size,
                    });
                }
            }
            step_size *= self.decrease_factor;
        }

        let solution = match best {
            Some(best) => LineSearchSolution {
                value: best.value,
                result: Results::NonlinearMaxStepsReached,
                state: LineSearchState {
                    next_init: best.step_size,
                    num_steps: self.max_steps,
                },
                aux: best.aux,
            },
            None => stay_put(y, options, Results::LineSearchFailed, self.max_steps),
        };
        finish(solution, throw)
    }
}
