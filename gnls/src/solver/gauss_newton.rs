use gnls_faer::Strategy;

use crate::{
    Error, Results,
    descent::NewtonDescent,
    function::{ResidualFn, linearize},
    line_search::{LearningRate, LineSearch, LineSearchOptions},
    linear::{FunctionLinearOperator, Tags},
    norm::{Norm, sum_squares},
    termination::cauchy_termination,
    tree::{Scalar, Tree},
};

use super::IterativeSolver;

/// The family of Gauss-Newton solvers.
///
/// Each step linearizes the residual at the current iterate, then hands the
/// residual and its Jacobian to a line search, which uses the descent to pick the
/// next iterate. Stopping is [`cauchy_termination`].
///
/// Implement this to get [`IterativeSolver`] for free.
pub trait AbstractGaussNewton {
    /// Picks the step direction.
    type Descent: crate::descent::Descent;
    /// Picks the step length.
    type LineSearch: LineSearch;

    /// Relative tolerance for convergence.
    fn rtol(&self) -> Scalar;
    /// Absolute tolerance for convergence.
    fn atol(&self) -> Scalar;
    /// How to measure the change in the iterate.
    fn norm(&self) -> Norm;
    /// The descent.
    fn descent(&self) -> &Self::Descent;
    /// The line search.
    fn line_search(&self) -> &Self::LineSearch;
}

/// Carried between Gauss-Newton steps.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussNewtonState<Y> {
    pub(crate) step_size: Scalar,
    pub(crate) diff: Y,
    pub(crate) f_val: Scalar,
    pub(crate) f_prev: Scalar,
    pub(crate) result: Results,
}

impl<Y> GaussNewtonState<Y> {
    /// Step size the next line search starts from.
    pub fn step_size(&self) -> Scalar {
        self.step_size
    }

    /// Change in the iterate over the last step.
    pub fn diff(&self) -> &Y {
        &self.diff
    }

    /// Objective at the start of the last step.
    pub fn f_val(&self) -> Scalar {
        self.f_val
    }

    /// Objective at the start of the step before that.
    pub fn f_prev(&self) -> Scalar {
        self.f_prev
    }

    /// Status of the last step.
    pub fn result(&self) -> Results {
        self.result
    }
}

impl<G, F, Y, Args> IterativeSolver<F, Y, Args> for G
where
    G: AbstractGaussNewton,
    Y: Tree,
    F: ResidualFn<Y, Args>,
{
    type State = GaussNewtonState<Y>;

    fn init(&self, _f: &F, y: &Y, _args: &Args, _tags: Tags) -> Self::State {
        GaussNewtonState {
            step_size: 1.0,
            diff: y.full_like(Scalar::INFINITY),
            f_val: Scalar::INFINITY,
            f_prev: Scalar::INFINITY,
            result: Results::Successful,
        }
    }

    fn step(
        &self,
        f: &F,
        y: &Y,
        args: &Args,
        state: &Self::State,
        tags: Tags,
    ) -> Result<(Y, Self::State, F::Aux), Error> {
        let (residual, jvp, aux) = linearize(f, y, args);
        let f_val = sum_squares(&residual);
        let jacobian = FunctionLinearOperator::new(jvp, y.clone(), residual.clone(), tags);

        let options: LineSearchOptions<'_, Y, F::Out, F::Aux> = LineSearchOptions {
            init_step_size: state.step_size,
            vector: &residual,
            operator: Some(&jacobian),
            operator_inv: None,
            f0: f_val,
            aux: &aux,
            gauss_newton: true,
        };
        let objective = |candidate: &Y| {
            let (residual, aux) = f.call(candidate, args);
            (sum_squares(&residual), aux)
        };
        let searched = self
            .line_search()
            .search(objective, self.descent(), y, &options, false)?;

        // Running out of line search steps still moved somewhere useful.
        let result = Results::select(
            searched.result == Results::NonlinearMaxStepsReached,
            Results::Successful,
            searched.result,
        );
        let new_state = GaussNewtonState {
            step_size: searched.state.next_init,
            diff: searched.value.sub(y),
            f_val,
            f_prev: state.f_val,
            result,
        };
        Ok((searched.value, new_state, searched.aux))
    }

    fn terminate(
        &self,
        _f: &F,
        y: &Y,
        _args: &Args,
        state: &Self::State,
        _tags: Tags,
    ) -> (bool, Results) {
        cauchy_termination(
            self.rtol(),
            self.atol(),
            self.norm(),
            y,
            &state.diff,
            state.f_val,
            state.f_prev,
            state.result,
        )
    }
}

/// Gauss-Newton for nonlinear least squares.
///
/// By default each step is a full Newton step ([`NewtonDescent`] with a
/// [`LearningRate`] of 1), solving the linearized problem in the least-squares
/// sense. Swap in a [`crate::BacktrackingArmijo`] line search for more robustness
/// far from the solution.
#[derive(Debug, Clone, Copy)]
pub struct GaussNewton<D = NewtonDescent, L = LearningRate> {
    /// Relative tolerance for convergence.
    pub rtol: Scalar,
    /// Absolute tolerance for convergence.
    pub atol: Scalar,
    /// How to measure the change in the iterate. Defaults to [`Norm::Max`].
    pub norm: Norm,
    /// Picks the step direction.
    pub descent: D,
    /// Picks the step length.
    pub line_search: L,
}

impl GaussNewton {
    /// Plain Gauss-Newton with the given tolerances.
    pub fn new(rtol: Scalar, atol: Scalar) -> Self {
        Self {
            rtol,
            atol,
            norm: Norm::default(),
            descent: NewtonDescent::default(),
            line_search: LearningRate::new(1.0),
        }
    }
}

impl<L> GaussNewton<NewtonDescent, L> {
    /// Solve each Newton step with this linear solver.
    pub fn with_linear_solver(mut self, linear_solver: Strategy) -> Self {
        self.descent.linear_solver = linear_solver;
        self
    }
}

impl<D, L> GaussNewton<D, L> {
    /// Measure convergence with this norm.
    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    /// Replace the descent.
    pub fn with_descent<D2>(self, descent: D2) -> GaussNewton<D2, L> {
        GaussNewton {
            rtol: self.rtol,
            atol: self.atol,
            norm: self.norm,
            descent,
            line_search: self.line_search,
        }
    }

    /// Replace the line search.
    pub fn with_line_search<L2>(self, line_search: L2) -> GaussNewton<D, L2> {
        GaussNewton {
            rtol: self.rtol,
            atol: self.atol,
            norm: self.norm,
            descent: self.descent,
            line_search,
        }
    }
}

impl<D, L> AbstractGaussNewton for GaussNewton<D, L>
where
    D: crate::descent::Descent,
    L: LineSearch,
{
    type Descent = D;
    type LineSearch = L;

    fn rtol(&self) -> Scalar {
        self.rtol
    }

    fn atol(&self) -> Scalar {
        self.atol
    }

    fn norm(&self) -> Norm {
        self.norm
    }

    fn descent(&self) -> &D {
        &self.descent
    }

    fn line_search(&self) -> &L {
        &self.line_search
    }
}
