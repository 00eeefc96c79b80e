//! The collection of implemented algorithms.
//!
//! [`ConjugateGradient`] and [`BiCgStab`] solve sparse linear systems,
//! [`LevenbergMarquardt`] and [`DogLeg`] minimize sparse nonlinear
//! least-squares problems. Every solver has a free function counterpart
//! ([`solve_cg`], [`solve_bicgstab`], [`solve_levenberg_marquardt`],
//! [`solve_dog_leg`]) for one-off solves with default options.

pub mod bicgstab;
pub mod cg;
pub mod dog_leg;
pub mod levenberg_marquardt;

pub use bicgstab::{solve_bicgstab, BiCgStab, BiCgStabOptions};
pub use cg::{solve_cg, CgOptions, ConjugateGradient};
pub use dog_leg::{solve_dog_leg, DogLeg, DogLegOptions};
pub use levenberg_marquardt::{
    solve_levenberg_marquardt, LevenbergMarquardt, LevenbergMarquardtOptions,
};

use nalgebra::DVector;

use crate::core::{LinearOperator, RealField, SolveError, SparseProblem};

/// Validates the operands of a linear system and returns its dimension.
pub(crate) fn check_linear_system<F, A>(
    a: &A,
    b: &DVector<F>,
    x: &DVector<F>,
) -> Result<usize, SolveError>
where
    F: RealField,
    A: LinearOperator<F> + ?Sized,
{
    let (nrows, ncols) = (a.nrows(), a.ncols());

    if nrows != ncols {
        return Err(SolveError::NotSquare { nrows, ncols });
    }

    if nrows == 0 {
        return Err(SolveError::Empty);
    }

    SolveError::check_dim("right-hand side", nrows, b.len())?;
    SolveError::check_dim("solution", nrows, x.len())?;

    Ok(nrows)
}

/// Validates the dimensions of a problem and its parameters.
pub(crate) fn check_problem<P: SparseProblem + ?Sized>(
    problem: &P,
    p: &DVector<P::Field>,
) -> Result<(), SolveError> {
    if problem.input_size() == 0 || problem.output_size() == 0 {
        return Err(SolveError::Empty);
    }

    SolveError::check_dim("parameters", problem.input_size(), p.len())
}

/// Resizes a work vector if its length does not match.
pub(crate) fn ensure_len<F: RealField>(v: &mut DVector<F>, n: usize) {
    if v.len() != n {
        *v = DVector::zeros(n);
    }
}
