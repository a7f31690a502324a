#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
mod linalg;

pub use linalg::{DenseCholesky, DenseLu, DenseQr, DenseSvd};

use core::fmt::{self, Display, Formatter};
use error_stack::{Report, ResultExt};
use faer::Mat;
use faer::mat::{MatMut, MatRef};
use faer_traits::ComplexField;
use num_traits::Float;

pub trait LinearSolver<T: ComplexField<Real = T>, M> {
    fn factor(&mut self, a: &M) -> SolverResult<()>;
    /// Solves in-place.
    /// `rhs` must have `max(nrows(A), ncols(A))` rows, with `b` in the top `nrows(A)` rows.
    /// - LU, Cholesky: overwrites `rhs` with the solution.
    /// - QR, SVD least-squares: writes the solution into the top ncols(A) rows of `rhs`.
    fn solve_in_place(&mut self, rhs: MatMut<'_, T>) -> SolverResult<()>;
}

/// What the caller knows about a matrix beyond its shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixProps {
    pub symmetric: bool,
    pub positive_semidefinite: bool,
}

/// Which factorization to use for a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Strategy {
    /// Pick a factorization from the matrix shape and [`MatrixProps`].
    ///
    /// `well_posed: None` solves non-square systems in the least-squares sense,
    /// `Some(true)` requires a square matrix, `Some(false)` always uses the SVD.
    Auto { well_posed: Option<bool> },
    Lu,
    Qr,
    Cholesky,
    Svd,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Auto { well_posed: None }
    }
}

/// A concrete factorization, as resolved from a [`Strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factorization {
    Lu,
    Qr,
    Cholesky,
    Svd,
}

impl Strategy {
    /// Resolve this strategy to a factorization for an `nrows x ncols` matrix.
    pub fn select(
        self,
        nrows: usize,
        ncols: usize,
        props: MatrixProps,
    ) -> SolverResult<Factorization> {
        let factorization = match self {
            Self::Lu => Factorization::Lu,
            Self::Qr => Factorization::Qr,
            Self::Cholesky => Factorization::Cholesky,
            Self::Svd => Factorization::Svd,
            Self::Auto {
                well_posed: Some(false),
            } => Factorization::Svd,
            Self::Auto { well_posed } => {
                if nrows == ncols {
                    if props.symmetric && props.positive_semidefinite {
                        Factorization::Cholesky
                    } else {
                        Factorization::Lu
                    }
                } else if well_posed == Some(true) {
                    return Err(Report::new(SolverError::ShapeMismatch).attach_printable(
                        format!(
                            "a well-posed solve needs a square matrix, got {nrows}x{ncols}; \
                             use `well_posed: None` for least squares"
                        ),
                    ));
                } else if nrows > ncols {
                    Factorization::Qr
                } else {
                    Factorization::Svd
                }
            }
        };
        Ok(factorization)
    }
}

/// Solve `A x = b` (or minimise `|A x - b|` for non-square `A`) with the given strategy.
pub fn solve_dense<T>(
    strategy: Strategy,
    a: MatRef<'_, T>,
    b: &[T],
    props: MatrixProps,
) -> SolverResult<Vec<T>>
where
    T: ComplexField<Real = T> + Float,
{
    let (nrows, ncols) = (a.nrows(), a.ncols());
    if b.len() != nrows {
        return Err(Report::new(SolverError::ShapeMismatch).attach_printable(format!(
            "right-hand side has {} rows but the matrix has {nrows}",
            b.len()
        )));
    }
    if ncols == 0 {
        return Ok(Vec::new());
    }

    let a = a.to_owned();
    let mut rhs = Mat::<T>::zeros(nrows.max(ncols), 1);
    for (i, &bi) in b.iter().enumerate() {
        rhs[(i, 0)] = bi;
    }

    let factorization = strategy.select(nrows, ncols, props)?;
    if !b.iter().all(|v| v.is_finite()) {
        return Err(Report::new(SolverError::NonFiniteInput)
            .attach_printable("right-hand side contains non-finite values"));
    }
    let solved = match factorization {
        Factorization::Lu => factor_and_solve(&mut DenseLu::default(), &a, rhs.as_mut()),
        Factorization::Qr => factor_and_solve(&mut DenseQr::default(), &a, rhs.as_mut()),
        Factorization::Cholesky => {
            factor_and_solve(&mut DenseCholesky::default(), &a, rhs.as_mut())
        }
        Factorization::Svd => factor_and_solve(&mut DenseSvd::default(), &a, rhs.as_mut()),
    };
    solved.attach_printable_lazy(|| {
        format!("{factorization:?} solve of a {nrows}x{ncols} system")
    })?;

    Ok(rhs.col(0).iter().take(ncols).copied().collect())
}

fn factor_and_solve<T, L>(solver: &mut L, a: &Mat<T>, rhs: MatMut<'_, T>) -> SolverResult<()>
where
    T: ComplexField<Real = T>,
    L: LinearSolver<T, Mat<T>>,
{
    solver.factor(a)?;
    solver.solve_in_place(rhs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    /// `solve_in_place` was called before `factor`.
    NotFactored,
    /// The matrix or right-hand side has the wrong shape for this factorization.
    ShapeMismatch,
    /// The matrix or right-hand side contains NaN or infinity.
    NonFiniteInput,
    /// The matrix is singular (or too ill-conditioned to produce a finite solution).
    Singular,
    /// Cholesky factorization hit a non-positive pivot.
    NotPositiveDefinite,
    /// The decomposition itself failed to converge.
    Decomposition,
}

impl SolverError {
    /// Whether this describes the numbers in the matrix, rather than how the solver was called.
    pub fn is_numerical(self) -> bool {
        !matches!(self, Self::NotFactored | Self::ShapeMismatch)
    }
}

impl Display for SolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFactored => "matrix was not factored before solving",
            Self::ShapeMismatch => "matrix shape is not supported by this factorization",
            Self::NonFiniteInput => "matrix contains non-finite values",
            Self::Singular => "matrix is singular",
            Self::NotPositiveDefinite => "matrix is not positive definite",
            Self::Decomposition => "matrix decomposition failed",
        })
    }
}

impl std::error::Error for SolverError {}

pub type SolverResult<T> = Result<T, Report<SolverError>>;

pub(crate) fn all_finite<T: Float>(m: MatRef<'_, T>) -> bool {
    (0..m.ncols()).all(|j| m.col(j).iter().all(|v| v.is_finite()))
}
