//! Descents: given a step size, which step to take.

use gnls_faer::Strategy;

use crate::{
    Error, Results,
    linear::{LinearOperator, linear_solve},
    norm::Norm,
    tree::{Scalar, Tree},
};

/// What a descent gets to look at when computing a step.
///
/// For Gauss-Newton `vector` is the residual and `operator` the Jacobian at the
/// current iterate.
pub struct DescentOptions<'a, Y: Tree, Out: Tree> {
    /// The vector the Newton system is solved for.
    pub vector: Option<&'a Out>,
    /// The operator to solve against.
    pub operator: Option<&'a dyn LinearOperator<Y, Out>>,
    /// An already-inverted operator. Used in preference to `operator`.
    pub operator_inv: Option<&'a dyn LinearOperator<Out, Y>>,
    /// Whether `vector` and `operator` are a residual and its Jacobian,
    /// rather than a gradient and a Hessian.
    pub gauss_newton: bool,
}

impl<Y: Tree, Out: Tree> Default for DescentOptions<'_, Y, Out> {
    fn default() -> Self {
        Self {
            vector: None,
            operator: None,
            operator_inv: None,
            gauss_newton: false,
        }
    }
}

impl<Y: Tree, Out: Tree> Clone for DescentOptions<'_, Y, Out> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Y: Tree, Out: Tree> Copy for DescentOptions<'_, Y, Out> {}

/// Computes a step `diff` to add to the current iterate, for a given step size.
pub trait Descent {
    /// Returns the step and the status of computing it.
    ///
    /// A numerical failure (e.g. a singular operator) is a status, not an error.
    fn compute<Y: Tree, Out: Tree>(
        &self,
        step_size: Scalar,
        options: &DescentOptions<'_, Y, Out>,
    ) -> Result<(Y, Results), Error>;
}

/// Newton descent: solve `operator(newton) = vector` and step along `-newton`.
///
/// For Gauss-Newton this is the least-squares solution of `J newton = r`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct NewtonDescent {
    /// Scale the Newton vector to unit norm before applying the step size.
    #[serde(skip)]
    pub norm: Option<Norm>,
    /// How to solve the linear system.
    pub linear_solver: Strategy,
}

impl NewtonDescent {
    /// A Newton descent that solves with `linear_solver`.
    pub fn new(linear_solver: Strategy) -> Self {
        Self {
            norm: None,
            linear_solver,
        }
    }

    /// Normalise the Newton vector with `norm` before scaling it by the step size.
    pub fn with_norm(self, norm: Norm) -> Self {
        Self {
            norm: Some(norm),
            ..self
        }
    }
}

impl Descent for NewtonDescent {
    fn compute<Y: Tree, Out: Tree>(
        &self,
        step_size: Scalar,
        options: &DescentOptions<'_, Y, Out>,
    ) -> Result<(Y, Results), Error> {
        let vector = options.vector.ok_or(Error::MissingVector)?;
        let (newton, result) = if let Some(operator_inv) = options.operator_inv {
            (operator_inv.mv(vector), Results::Successful)
        } else if let Some(operator) = options.operator {
            let solution = linear_solve(operator, vector, self.linear_solver)?;
            (solution.value, solution.result)
        } else {
            return Err(Error::MissingOperator);
        };

        let newton = match self.norm {
            Some(norm) => {
                let size = norm.apply(&newton);
                // A zero (or broken) Newton vector stays as it is.
                if size > 0.0 && size.is_finite() {
                    newton.scale(1.0 / size)
                } else {
                    newton
                }
            }
            None => newton,
        };
        Ok((newton.scale(-step_size), result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{FunctionLinearOperator, Tags};

    fn diag_operator() -> FunctionLinearOperator<Vec<f64>, Vec<f64>, impl Fn(&Vec<f64>) -> Vec<f64>>
    {
        FunctionLinearOperator::new(
            |v: &Vec<f64>| vec![2.0 * v[0], 4.0 * v[1]],
            vec![0.0; 2],
            vec![0.0; 2],
            Tags::default(),
        )
    }

    #[test]
    fn newton_step() {
        let op = diag_operator();
        let vector = vec![2.0, 4.0];
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            vector: Some(&vector),
            operator: Some(&op),
            ..Default::default()
        };
        let (diff, result) = NewtonDescent::default()
            .compute(0.5, &options)
            .expect("descent");
        assert!(result.is_successful());
        assert_eq!(diff, vec![-0.5, -0.5]);
    }

    #[test]
    fn inverse_operator_wins() {
        let op = diag_operator();
        // Deliberately not the inverse of `op`, to see which one is used.
        let inv = FunctionLinearOperator::new(
            |v: &Vec<f64>| vec![v[0], v[1]],
            vec![0.0; 2],
            vec![0.0; 2],
            Tags::default(),
        );
        let vector = vec![2.0, 4.0];
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            vector: Some(&vector),
            operator: Some(&op),
            operator_inv: Some(&inv),
            gauss_newton: false,
        };
        let (diff, _) = NewtonDescent::default().compute(1.0, &options).expect("descent");
        assert_eq!(diff, vec![-2.0, -4.0]);
    }

    #[test]
    fn normalised_step() {
        let op = diag_operator();
        let vector = vec![6.0, 16.0];
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            vector: Some(&vector),
            operator: Some(&op),
            ..Default::default()
        };
        let descent = NewtonDescent::default().with_norm(Norm::Two);
        let (diff, _) = descent.compute(2.0, &options).expect("descent");
        // Newton vector is (3, 4), unit length (0.6, 0.8).
        assert!((diff[0] + 1.2).abs() < 1e-12);
        assert!((diff[1] + 1.6).abs() < 1e-12);
    }

    #[test]
    fn zero_newton_vector_is_not_normalised() {
        let op = diag_operator();
        let vector = vec![0.0, 0.0];
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            vector: Some(&vector),
            operator: Some(&op),
            ..Default::default()
        };
        let descent = NewtonDescent::default().with_norm(Norm::Two);
        let (diff, result) = descent.compute(1.0, &options).expect("descent");
        assert!(result.is_successful());
        assert!(diff.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn missing_inputs() {
        let op = diag_operator();
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            operator: Some(&op),
            ..Default::default()
        };
        let err = NewtonDescent::default()
            .compute(1.0, &options)
            .expect_err("no vector");
        assert!(matches!(err, Error::MissingVector));

        let vector = vec![1.0, 1.0];
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            vector: Some(&vector),
            ..Default::default()
        };
        let err = NewtonDescent::default()
            .compute(1.0, &options)
            .expect_err("no operator");
        assert!(matches!(err, Error::MissingOperator));
    }

    #[test]
    fn singular_operator_is_reported() {
        let op = FunctionLinearOperator::new(
            |v: &Vec<f64>| vec![v[0], 0.0],
            vec![0.0; 2],
            vec![0.0; 2],
            Tags::default(),
        );
        let vector = vec![1.0, 1.0];
        let options: DescentOptions<'_, Vec<f64>, Vec<f64>> = DescentOptions {
            vector: Some(&vector),
            operator: Some(&op),
            ..Default::default()
        };
        let (_, result) = NewtonDescent::new(Strategy::Lu)
            .compute(1.0, &options)
            .expect("status, not error");
        assert_eq!(result, Results::Singular);
    }
}
