use super::{ComplexField, LinearSolver, Mat, SolverError, SolverResult, all_finite};
use error_stack::{Report, ResultExt};
use faer::{
    Col, Side,
    linalg::solvers::{FullPivLu, Llt, Qr},
    mat::MatMut,
    prelude::{Solve, SolveLstsq},
};
use num_traits::Float;

fn check_input<T: Float>(a: &Mat<T>) -> SolverResult<()> {
    if all_finite(a.as_ref()) {
        Ok(())
    } else {
        Err(Report::new(SolverError::NonFiniteInput))
    }
}

fn check_square<T>(a: &Mat<T>, what: &'static str) -> SolverResult<()> {
    if a.nrows() == a.ncols() {
        Ok(())
    } else {
        Err(Report::new(SolverError::ShapeMismatch).attach_printable(format!(
            "{what} needs a square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )))
    }
}

/// Magnitudes at or below this, relative to the largest pivot or singular value,
/// count as zero.
fn rank_cutoff<T: Float>(largest: T, dim: usize) -> T {
    let dim = num_traits::cast::<usize, T>(dim).unwrap_or_else(T::one);
    largest * dim * T::epsilon()
}

/// The top `n` rows of `rhs` hold the solution; anything else in there means the
/// factorization divided by a zero (or vanishing) pivot.
fn check_solution<T: Float>(rhs: &MatMut<'_, T>, n: usize) -> SolverResult<()> {
    let finite = rhs.as_ref().col(0).iter().take(n).all(|v| v.is_finite());
    if finite {
        Ok(())
    } else {
        Err(Report::new(SolverError::Singular).attach_printable("solution is not finite"))
    }
}

pub struct DenseLu<T: ComplexField<Real = T>> {
    lu: Option<FullPivLu<T>>,
}

impl<T: ComplexField<Real = T>> Default for DenseLu<T> {
    fn default() -> Self {
        Self { lu: None }
    }
}

impl<T: ComplexField<Real = T> + Float> LinearSolver<T, Mat<T>> for DenseLu<T> {
    fn factor(&mut self, a: &Mat<T>) -> SolverResult<()> {
        check_square(a, "LU")?;
        check_input(a)?;
        let lu = a.full_piv_lu();

        let u = lu.U();
        let pivots: Vec<T> = (0..u.nrows()).map(|i| Float::abs(u[(i, i)])).collect();
        let largest = pivots.iter().copied().fold(T::zero(), Float::max);
        let smallest = pivots.iter().copied().fold(T::infinity(), Float::min);
        let cutoff = rank_cutoff(largest, a.nrows());
        if smallest <= cutoff {
            return Err(Report::new(SolverError::Singular).attach_printable(format!(
                "LU pivot {smallest:?} is below the rank cutoff {cutoff:?}"
            )));
        }
        self.lu = Some(lu);
        Ok(())
    }

    fn solve_in_place(&mut self, mut rhs: MatMut<'_, T>) -> SolverResult<()> {
        let lu = self
            .lu
            .as_ref()
            .ok_or(SolverError::NotFactored)
            .attach_printable("Dense LU not factorized")?;

        // FullPivLu returns a new matrix; copy the result back into `rhs` to keep in-place.
        let solution = lu.solve(rhs.as_ref());
        rhs.copy_from(&solution);
        check_solution(&rhs, rhs.nrows())
    }
}

pub struct DenseQr<T: ComplexField<Real = T>> {
    qr: Option<Qr<T>>,
    ncols: usize,
}

impl<T: ComplexField<Real = T>> Default for DenseQr<T> {
    fn default() -> Self {
        Self { qr: None, ncols: 0 }
    }
}

impl<T: ComplexField<Real = T> + Float> LinearSolver<T, Mat<T>> for DenseQr<T> {
    fn factor(&mut self, a: &Mat<T>) -> SolverResult<()> {
        if a.nrows() < a.ncols() {
            return Err(Report::new(SolverError::ShapeMismatch).attach_printable(format!(
                "QR least squares needs at least as many rows as columns, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        check_input(a)?;
        self.qr = Some(a.qr());
        self.ncols = a.ncols();
        Ok(())
    }

    fn solve_in_place(&mut self, mut rhs: MatMut<'_, T>) -> SolverResult<()> {
        let qr = self
            .qr
            .as_ref()
            .ok_or(SolverError::NotFactored)
            .attach_printable("QR factorization not available for solve")?;

        // Least-squares: faer writes the solution into the top ncols(A) rows of `rhs`.
        qr.solve_lstsq_in_place(rhs.as_mut());
        check_solution(&rhs, self.ncols)
    }
}

pub struct DenseCholesky<T: ComplexField<Real = T>> {
    llt: Option<Llt<T>>,
}

impl<T: ComplexField<Real = T>> Default for DenseCholesky<T> {
    fn default() -> Self {
        Self { llt: None }
    }
}

impl<T: ComplexField<Real = T> + Float> LinearSolver<T, Mat<T>> for DenseCholesky<T> {
    fn factor(&mut self, a: &Mat<T>) -> SolverResult<()> {
        check_square(a, "Cholesky")?;
        check_input(a)?;
        let llt = a
            .llt(Side::Lower)
            .map_err(|_| Report::new(SolverError::NotPositiveDefinite))
            .attach_printable("Cholesky factorization found a non-positive pivot")?;
        self.llt = Some(llt);
        Ok(())
    }

    fn solve_in_place(&mut self, mut rhs: MatMut<'_, T>) -> SolverResult<()> {
        let llt = self
            .llt
            .as_ref()
            .ok_or(SolverError::NotFactored)
            .attach_printable("Cholesky not factorized")?;

        let solution = llt.solve(rhs.as_ref());
        rhs.copy_from(&solution);
        check_solution(&rhs, rhs.nrows())
    }
}

/// Pseudo-inverse solve through the singular value decomposition.
/// Singular values below `max(nrows, ncols) * eps * largest` are treated as zero,
/// which gives the minimum-norm least-squares solution.
pub struct DenseSvd<T: ComplexField<Real = T>> {
    u: Mat<T>,
    v: Mat<T>,
    sigma: Vec<T>,
    factored: bool,
}

impl<T: ComplexField<Real = T>> Default for DenseSvd<T> {
    fn default() -> Self {
        Self {
            u: Mat::zeros(0, 0),
            v: Mat::zeros(0, 0),
            sigma: Vec::new(),
            factored: false,
        }
    }
}

impl<T: ComplexField<Real = T> + Float> LinearSolver<T, Mat<T>> for DenseSvd<T> {
    fn factor(&mut self, a: &Mat<T>) -> SolverResult<()> {
        check_input(a)?;
        let svd = a
            .svd()
            .map_err(|_| Report::new(SolverError::Decomposition))
            .attach_printable("SVD did not converge")?;
        self.u = svd.U().to_owned();
        self.v = svd.V().to_owned();
        self.sigma = svd.S().column_vector().iter().copied().collect();
        self.factored = true;
        Ok(())
    }

    fn solve_in_place(&mut self, mut rhs: MatMut<'_, T>) -> SolverResult<()> {
        if !self.factored {
            return Err(Report::new(SolverError::NotFactored).attach_printable("SVD not computed"));
        }
        let (nrows, ncols) = (self.u.nrows(), self.v.nrows());

        let largest = self.sigma.iter().copied().fold(T::zero(), Float::max);
        let cutoff = rank_cutoff(largest, nrows.max(ncols));

        let b: Vec<T> = rhs.as_ref().col(0).iter().take(nrows).copied().collect();
        let b = Col::<T>::from_fn(nrows, |r| b[r]);
        let projected = self.u.transpose() * &b;
        // x = V S⁺ Uᵀ b, dropping singular values under the cutoff.
        let scaled = Col::<T>::from_fn(ncols, |i| match self.sigma.get(i) {
            Some(&s) if s > cutoff => projected[i] / s,
            _ => T::zero(),
        });
        let x = &self.v * &scaled;

        let mut solution = Mat::<T>::zeros(rhs.nrows(), 1);
        for (row, &xj) in x.iter().enumerate() {
            solution[(row, 0)] = xj;
        }
        rhs.copy_from(&solution);
        check_solution(&rhs, ncols)
    }
}
