//! Tools for derivative-based methods.
//!
//! The nonlinear solvers linearize the problem in every iteration, which means
//! assembling the sparse Jacobian matrix from the rows reported by
//! [`SparseProblem::differentiate`]. The rows are independent, so they are
//! computed in parallel into separate buffers and merged into compressed row
//! storage afterwards.

use std::ops::Deref;

use nalgebra::DVector;
use rayon::prelude::*;
use thiserror::Error;

use crate::core::{ProblemError, RealField, SparseMatrix, SparseProblem};

/// Error when computing the Jacobian matrix.
#[derive(Debug, Error)]
pub enum JacobianError {
    /// Error that occurred when differentiating the problem.
    #[error("{0}")]
    Problem(#[from] ProblemError),
}

/// Sparse Jacobian matrix of a problem.
#[derive(Debug, Clone)]
pub struct SparseJacobian<F> {
    jac: SparseMatrix<F>,
}

impl<F: RealField> SparseJacobian<F> {
    /// Initializes the Jacobian matrix of a problem with zeros.
    pub fn zeros<P: SparseProblem<Field = F>>(p: &P) -> Self {
        Self {
            jac: SparseMatrix::zeros(p.output_size(), p.input_size()),
        }
    }

    /// Computes the Jacobian matrix of the problem in given point. See
    /// [`compute`](SparseJacobian::compute) for more details.
    pub fn new<P: SparseProblem<Field = F>>(p: &P, x: &DVector<F>) -> Result<Self, JacobianError> {
        let mut jac = Self::zeros(p);
        jac.compute(p, x)?;
        Ok(jac)
    }

    /// Computes the Jacobian matrix of the problem in given point.
    ///
    /// Every output row is differentiated exactly once. Duplicate columns
    /// within a row are resolved by keeping the value reported last. Columns
    /// out of range and non-finite derivatives are reported as errors.
    pub fn compute<P: SparseProblem<Field = F>>(
        &mut self,
        p: &P,
        x: &DVector<F>,
    ) -> Result<&mut Self, JacobianError> {
        let nrows = p.output_size();
        let ncols = p.input_size();

        if x.len() != ncols {
            return Err(ProblemError::InvalidDimensionality.into());
        }

        let rows = (0..nrows)
            .into_par_iter()
            .map_init(Vec::<(usize, F)>::new, |buf, i| {
                buf.clear();
                p.differentiate(i, x, buf)?;
                normalize_row(i, ncols, buf)
            })
            .collect::<Result<Vec<_>, ProblemError>>()?;

        self.jac = SparseMatrix::from_rows(nrows, ncols, rows);
        Ok(self)
    }

    /// Unwraps the underlying sparse matrix.
    pub fn into_inner(self) -> SparseMatrix<F> {
        self.jac
    }
}

impl<F> Deref for SparseJacobian<F> {
    type Target = SparseMatrix<F>;

    fn deref(&self) -> &Self::Target {
        &self.jac
    }
}

/// Assembles the Jacobian matrix of the problem in given point.
pub fn assemble_jacobian<P: SparseProblem>(
    p: &P,
    x: &DVector<P::Field>,
) -> Result<SparseMatrix<P::Field>, JacobianError> {
    SparseJacobian::new(p, x).map(SparseJacobian::into_inner)
}

/// Validates a reported row and turns it into a sorted row without duplicate
/// columns.
fn normalize_row<F: RealField>(
    row: usize,
    ncols: usize,
    entries: &mut Vec<(usize, F)>,
) -> Result<Vec<(usize, F)>, ProblemError> {
    if let Some(&(col, _)) = entries.iter().find(|(col, _)| *col >= ncols) {
        return Err(ProblemError::ColumnOutOfRange { row, col });
    }

    if entries.iter().any(|(_, value)| !value.is_finite()) {
        return Err(ProblemError::InvalidValue);
    }

    // Stable sort keeps the reporting order of duplicate columns.
    entries.sort_by_key(|(col, _)| *col);

    let mut normalized: Vec<(usize, F)> = Vec::with_capacity(entries.len());
    for &(col, value) in entries.iter() {
        match normalized.last_mut() {
            Some(last) if last.0 == col => last.1 = value,
            _ => normalized.push((col, value)),
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ExtendedPowell, ExtendedRosenbrock, LinearProblem};

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    struct Duplicates;

    impl SparseProblem for Duplicates {
        type Field = f64;

        fn input_size(&self) -> usize {
            3
        }

        fn output_size(&self) -> usize {
            2
        }

        fn constraint(&self) -> DVector<Self::Field> {
            DVector::zeros(2)
        }

        fn evaluate(
            &self,
            _p: &DVector<Self::Field>,
            fx: &mut DVector<Self::Field>,
        ) -> Result<(), ProblemError> {
            fx.fill(0.0);
            Ok(())
        }

        fn differentiate(
            &self,
            index: usize,
            _p: &DVector<Self::Field>,
            derivative: &mut Vec<(usize, Self::Field)>,
        ) -> Result<(), ProblemError> {
            if index == 0 {
                derivative.extend([(2, 1.0), (0, 5.0), (2, 3.0)]);
            } else {
                derivative.push((1, 4.0));
            }
            Ok(())
        }
    }

    struct OutOfRange;

    impl SparseProblem for OutOfRange {
        type Field = f64;

        fn input_size(&self) -> usize {
            1
        }

        fn output_size(&self) -> usize {
            1
        }

        fn constraint(&self) -> DVector<Self::Field> {
            DVector::zeros(1)
        }

        fn evaluate(
            &self,
            _p: &DVector<Self::Field>,
            _fx: &mut DVector<Self::Field>,
        ) -> Result<(), ProblemError> {
            Ok(())
        }

        fn differentiate(
            &self,
            _index: usize,
            _p: &DVector<Self::Field>,
            derivative: &mut Vec<(usize, Self::Field)>,
        ) -> Result<(), ProblemError> {
            derivative.push((1, 1.0));
            Ok(())
        }
    }

    #[test]
    fn rosenbrock_jacobian() {
        let x = dvector![2.0, 2.0];

        let f = ExtendedRosenbrock::new(2);
        let jac = SparseJacobian::new(&f, &x).unwrap();

        let expected = dmatrix![-40.0, 10.0; -1.0, 0.0];
        assert_abs_diff_eq!(jac.to_dense(), expected, epsilon = 1e-12);
        assert_eq!(jac.nnz(), 3);
    }

    #[test]
    fn powell_jacobian_in_root() {
        let x = dvector![0.0, 0.0, 0.0, 0.0];

        let f = ExtendedPowell::new(4);
        let jac = assemble_jacobian(&f, &x).unwrap();

        let expected = dmatrix![
            1.0, 10.0, 0.0, 0.0;
            0.0, 0.0, 5f64.sqrt(), -(5f64.sqrt());
            0.0, 0.0, 0.0, 0.0;
            0.0, 0.0, 0.0, 0.0
        ];
        assert_abs_diff_eq!(jac.to_dense(), expected, epsilon = 1e-12);
    }

    #[test]
    fn duplicate_columns_overwrite() {
        let jac = assemble_jacobian(&Duplicates, &dvector![0.0, 0.0, 0.0]).unwrap();

        assert_eq!(jac.row(0).collect::<Vec<_>>(), vec![(0, 5.0), (2, 3.0)]);
        assert_eq!(jac.row(1).collect::<Vec<_>>(), vec![(1, 4.0)]);
    }

    #[test]
    fn column_out_of_range() {
        let result = assemble_jacobian(&OutOfRange, &dvector![0.0]);

        assert!(matches!(
            result,
            Err(JacobianError::Problem(ProblemError::ColumnOutOfRange {
                row: 0,
                col: 1
            }))
        ));
    }

    #[test]
    fn invalid_input_dimension() {
        let f = ExtendedRosenbrock::new(2);
        let result = assemble_jacobian(&f, &dvector![1.0, 2.0, 3.0]);

        assert!(matches!(
            result,
            Err(JacobianError::Problem(ProblemError::InvalidDimensionality))
        ));
    }

    #[test]
    fn linear_problem_jacobian_is_the_matrix() {
        let f = LinearProblem::random(300, 40, 7);
        let x = DVector::from_element(40, 1.0);

        let jac = assemble_jacobian(&f, &x).unwrap();
        assert_eq!(&jac, f.matrix());
    }

    #[test]
    fn reusing_storage() {
        let f = ExtendedRosenbrock::new(4);
        let mut jac = SparseJacobian::zeros(&f);
        assert_eq!(jac.nnz(), 0);

        jac.compute(&f, &dvector![1.0, 1.0, 1.0, 1.0]).unwrap();
        let first = jac.to_dense();

        jac.compute(&f, &dvector![-1.0, 1.0, -1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(jac.to_dense()[(0, 0)], -first[(0, 0)]);
    }
}
