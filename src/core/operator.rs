//! Linear operators seen by the Krylov solvers.
//!
//! The iterative linear solvers never look inside the matrix; all they need is
//! the product `y = A x`. [`LinearOperator`] captures exactly that, which
//! allows solving with a [`SparseMatrix`], a dense matrix or a matrix-free
//! composition such as [`Shifted`] without forming it explicitly.

use nalgebra::{convert, DMatrix, DVector};

use super::{base::RealField, sparse::SparseMatrix};

/// A linear map `x -> A x`.
pub trait LinearOperator<F: RealField> {
    /// Dimension of the output.
    fn nrows(&self) -> usize;

    /// Dimension of the input.
    fn ncols(&self) -> usize;

    /// Computes `y = A x`. Implementations can assume that the lengths of `x`
    /// and `y` match [`ncols`](LinearOperator::ncols) and
    /// [`nrows`](LinearOperator::nrows).
    fn apply(&self, x: &DVector<F>, y: &mut DVector<F>);
}

impl<F: RealField> LinearOperator<F> for SparseMatrix<F> {
    fn nrows(&self) -> usize {
        SparseMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        SparseMatrix::ncols(self)
    }

    fn apply(&self, x: &DVector<F>, y: &mut DVector<F>) {
        self.mul_to(x, y);
    }
}

impl<F: RealField> LinearOperator<F> for DMatrix<F> {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn apply(&self, x: &DVector<F>, y: &mut DVector<F>) {
        self.mul_to(x, y);
    }
}

impl<F: RealField, A: LinearOperator<F> + ?Sized> LinearOperator<F> for &A {
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    fn apply(&self, x: &DVector<F>, y: &mut DVector<F>) {
        (**self).apply(x, y);
    }
}

/// Operator `A + shift * I`.
///
/// Used for the damped normal equations `(J^T J + lambda I) x = J^T r` of the
/// Levenberg-Marquardt method, where the damping changes between retries but
/// the Gram matrix does not.
#[derive(Debug, Clone, Copy)]
pub struct Shifted<'a, A: ?Sized, F> {
    op: &'a A,
    shift: F,
}

impl<'a, A: ?Sized, F: RealField> Shifted<'a, A, F> {
    /// Wraps the operator with given diagonal shift.
    pub fn new(op: &'a A, shift: F) -> Self {
        Self { op, shift }
    }

    /// The diagonal shift.
    pub fn shift(&self) -> F {
        self.shift
    }
}

impl<'a, A, F> LinearOperator<F> for Shifted<'a, A, F>
where
    A: LinearOperator<F> + ?Sized,
    F: RealField,
{
    fn nrows(&self) -> usize {
        self.op.nrows()
    }

    fn ncols(&self) -> usize {
        self.op.ncols()
    }

    fn apply(&self, x: &DVector<F>, y: &mut DVector<F>) {
        self.op.apply(x, y);
        if self.shift != convert(0.0) {
            y.axpy(self.shift, x, convert(1.0));
        }
    }
}
