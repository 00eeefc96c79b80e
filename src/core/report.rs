use thiserror::Error;

use super::vector::DimensionError;

/// Per-iteration progress callback.
///
/// Receives the number of completed iterations (starting at 1) and the current
/// error. Returning `false` stops the solver after the current iteration.
pub type Monitor<'a, F> = &'a mut dyn FnMut(usize, F) -> bool;

/// The reason why the iterative process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The error dropped below the tolerance.
    Converged,
    /// The iteration budget was exhausted before reaching the tolerance.
    MaxIterations,
    /// The monitor requested to stop.
    Cancelled,
    /// A numerically zero denominator or an invalid value was encountered.
    /// The solution holds the last stable iterate.
    Breakdown,
    /// No step that reduces the error could be found within the allowed
    /// number of rejections.
    Stalled,
}

impl Termination {
    /// Returns `true` for [`Termination::Converged`].
    pub fn is_converged(self) -> bool {
        self == Termination::Converged
    }
}

/// Summary of a finished solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveReport<F> {
    status: Termination,
    iterations: usize,
    error: F,
}

impl<F> SolveReport<F> {
    pub(crate) fn new(status: Termination, iterations: usize, error: F) -> Self {
        Self {
            status,
            iterations,
            error,
        }
    }

    /// How the process ended.
    pub fn status(&self) -> Termination {
        self.status
    }

    /// Number of completed iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl<F: Copy> SolveReport<F> {
    /// The final error. The residual norm `|| b - A x ||` for linear solvers
    /// and `|| c - f(p) ||^2` for nonlinear solvers.
    pub fn error(&self) -> F {
        self.error
    }
}

/// Invalid input passed to a solver. Reported before any iteration, the
/// solution vector is left untouched.
#[derive(Debug, Error)]
pub enum SolveError {
    /// Lengths of vectors do not match the dimensions of the system.
    #[error("{what}: {source}")]
    Dimension {
        /// Which operand is wrong.
        what: &'static str,
        /// The mismatch.
        source: DimensionError,
    },
    /// Linear system matrix is not square.
    #[error("matrix is not square ({nrows}x{ncols})")]
    NotSquare {
        /// Number of rows.
        nrows: usize,
        /// Number of columns.
        ncols: usize,
    },
    /// The system has no unknowns or no equations.
    #[error("empty problem")]
    Empty,
}

impl SolveError {
    pub(crate) fn check_dim(
        what: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), SolveError> {
        DimensionError::check(expected, actual)
            .map_err(|source| SolveError::Dimension { what, source })
    }
}
