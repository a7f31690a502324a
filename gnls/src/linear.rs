//! Linear operators between trees, and solving against them.

use faer::{Col, Mat};
use gnls_faer::{MatrixProps, Strategy, solve_dense};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Results,
    tree::{Scalar, Structure, Tree},
};

/// Structural facts about an operator, used to pick a linear solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Tags {
    /// The operator equals its transpose.
    pub symmetric: bool,
    /// `<x, A x> >= 0` for every `x`.
    pub positive_semidefinite: bool,
}

impl Tags {
    /// Symmetric and positive semidefinite, like a normal-equations matrix `JᵀJ`.
    pub fn symmetric_psd() -> Self {
        Self {
            symmetric: true,
            positive_semidefinite: true,
        }
    }

    fn props(self) -> MatrixProps {
        MatrixProps {
            symmetric: self.symmetric,
            positive_semidefinite: self.positive_semidefinite,
        }
    }
}

/// A linear map from `In`-shaped trees to `Out`-shaped trees.
pub trait LinearOperator<In: Tree, Out: Tree> {
    /// Apply the operator.
    fn mv(&self, vector: &In) -> Out;

    /// A value with the structure of the operator's input.
    fn in_template(&self) -> &In;

    /// A value with the structure of the operator's output.
    fn out_template(&self) -> &Out;

    /// Structural facts about this operator.
    fn tags(&self) -> Tags {
        Tags::default()
    }

    /// Structure of the operator's input.
    fn in_structure(&self) -> Structure {
        self.in_template().structure()
    }

    /// Structure of the operator's output.
    fn out_structure(&self) -> Structure {
        self.out_template().structure()
    }

    /// Materialize as a dense `out_size x in_size` matrix over the flattened leaves.
    ///
    /// The default applies the operator to each unit basis vector of the input.
    fn as_matrix(&self) -> Mat<Scalar> {
        let input = self.in_template();
        let (nrows, ncols) = (self.out_template().size(), input.size());
        let mut matrix = Mat::zeros(nrows, ncols);
        for col in 0..ncols {
            let image = self.mv(&input.unit_like(col)).leaves();
            for (row, value) in image.into_iter().enumerate() {
                matrix[(row, col)] = value;
            }
        }
        matrix
    }
}

/// A linear operator defined by a function, e.g. the Jacobian-vector product of a residual.
pub struct FunctionLinearOperator<In, Out, M> {
    map: M,
    input: In,
    output: Out,
    tags: Tags,
}

impl<In, Out, M> FunctionLinearOperator<In, Out, M>
where
    In: Tree,
    Out: Tree,
    M: Fn(&In) -> Out,
{
    /// `input` and `output` are only used for their structure.
    pub fn new(map: M, input: In, output: Out, tags: Tags) -> Self {
        Self {
            map,
            input,
            output,
            tags,
        }
    }
}

impl<In, Out, M> LinearOperator<In, Out> for FunctionLinearOperator<In, Out, M>
where
    In: Tree,
    Out: Tree,
    M: Fn(&In) -> Out,
{
    fn mv(&self, vector: &In) -> Out {
        (self.map)(vector)
    }

    fn in_template(&self) -> &In {
        &self.input
    }

    fn out_template(&self) -> &Out {
        &self.output
    }

    fn tags(&self) -> Tags {
        self.tags
    }
}

/// A linear operator stored as a dense matrix over flattened leaves.
#[derive(Debug, Clone)]
pub struct MatrixLinearOperator<In, Out> {
    matrix: Mat<Scalar>,
    input: In,
    output: Out,
    tags: Tags,
}

impl<In: Tree, Out: Tree> MatrixLinearOperator<In, Out> {
    /// The matrix must be `output.size() x input.size()`.
    pub fn new(matrix: Mat<Scalar>, input: In, output: Out, tags: Tags) -> Result<Self, Error> {
        if matrix.nrows() != output.size() {
            return Err(Error::StructureMismatch {
                expected: matrix.nrows(),
                actual: output.size(),
            });
        }
        if matrix.ncols() != input.size() {
            return Err(Error::StructureMismatch {
                expected: matrix.ncols(),
                actual: input.size(),
            });
        }
        Ok(Self {
            matrix,
            input,
            output,
            tags,
        })
    }

    /// The underlying matrix.
    pub fn matrix(&self) -> &Mat<Scalar> {
        &self.matrix
    }
}

impl<In: Tree, Out: Tree> LinearOperator<In, Out> for MatrixLinearOperator<In, Out> {
    fn mv(&self, vector: &In) -> Out {
        let leaves = vector.leaves();
        let x = Col::<Scalar>::from_fn(leaves.len(), |i| leaves[i]);
        let y = &self.matrix * &x;
        self.output.from_leaves(&y.iter().copied().collect::<Vec<_>>())
    }

    fn in_template(&self) -> &In {
        &self.input
    }

    fn out_template(&self) -> &Out {
        &self.output
    }

    fn tags(&self) -> Tags {
        self.tags
    }

    fn as_matrix(&self) -> Mat<Scalar> {
        self.matrix.clone()
    }
}

/// Result of [`linear_solve`].
#[derive(Debug, Clone)]
pub struct LinearSolution<Y> {
    /// The solution. Filled with NaN when `result` is not successful.
    pub value: Y,
    /// Status of the solve.
    pub result: Results,
}

/// Find `x` with `operator(x) = vector`, or the least-squares `x` when the operator
/// is not square.
///
/// Numerical failures (singular operator, non-finite input) come back as a status
/// on the solution. Only a misconfigured solver is an [`Error`].
pub fn linear_solve<In, Out, Op>(
    operator: &Op,
    vector: &Out,
    strategy: Strategy,
) -> Result<LinearSolution<In>, Error>
where
    In: Tree,
    Out: Tree,
    Op: LinearOperator<In, Out> + ?Sized,
{
    let matrix = operator.as_matrix();
    let template = operator.in_template();
    match solve_dense(
        strategy,
        matrix.as_ref(),
        &vector.leaves(),
        operator.tags().props(),
    ) {
        Ok(x) => Ok(LinearSolution {
            value: template.from_leaves(&x),
            result: Results::Successful,
        }),
        Err(report) => match Results::from_linear_error(*report.current_context()) {
            Some(result) => Ok(LinearSolution {
                value: template.full_like(Scalar::NAN),
                result,
            }),
            None => Err(Error::LinearSolverConfig(report)),
        },
    }
}
