//! Abstractions and types for defining sparse least-squares problems.
//!
//! # Defining a problem
//!
//! A problem is any type that implements the [`SparseProblem`] trait. It
//! describes a model `f: R^n -> R^m` (the [`evaluate`](SparseProblem::evaluate)
//! method), the rows of its Jacobian matrix (the
//! [`differentiate`](SparseProblem::differentiate) method) and a target vector
//! `c` (the [`constraint`](SparseProblem::constraint) method). The nonlinear
//! solvers then minimize `|| c - f(p) ||^2` over the parameters `p`.
//!
//! ```rust
//! use sparsolve::nalgebra as na;
//! use sparsolve::{ProblemError, SparseProblem};
//! use na::DVector;
//!
//! // Fit y = a * exp(b * t) to a set of samples.
//! struct ExpFit {
//!     t: Vec<f64>,
//!     y: DVector<f64>,
//! }
//!
//! impl SparseProblem for ExpFit {
//!     type Field = f64;
//!
//!     fn input_size(&self) -> usize {
//!         2
//!     }
//!
//!     fn output_size(&self) -> usize {
//!         self.t.len()
//!     }
//!
//!     fn constraint(&self) -> DVector<Self::Field> {
//!         self.y.clone()
//!     }
//!
//!     fn evaluate(
//!         &self,
//!         p: &DVector<Self::Field>,
//!         fx: &mut DVector<Self::Field>,
//!     ) -> Result<(), ProblemError> {
//!         for (fi, ti) in fx.iter_mut().zip(&self.t) {
//!             *fi = p[0] * (p[1] * ti).exp();
//!         }
//!         Ok(())
//!     }
//!
//!     fn differentiate(
//!         &self,
//!         index: usize,
//!         p: &DVector<Self::Field>,
//!         derivative: &mut Vec<(usize, Self::Field)>,
//!     ) -> Result<(), ProblemError> {
//!         // Only the nonzero entries of the row need to be reported.
//!         let ti = self.t[index];
//!         let e = (p[1] * ti).exp();
//!         derivative.push((0, e));
//!         derivative.push((1, p[0] * ti * e));
//!         Ok(())
//!     }
//! }
//! ```

use nalgebra::DVector;
use thiserror::Error;

use super::{base::RealField, vector::VectorExt};

/// Error encountered while evaluating or differentiating a problem.
#[derive(Debug, Error)]
pub enum ProblemError {
    /// The length of a vector does not match the dimensionality of the
    /// problem.
    #[error("invalid dimensionality")]
    InvalidDimensionality,
    /// An invalid value (NaN, positive or negative infinity) of an output or a
    /// derivative occurred.
    #[error("invalid value encountered")]
    InvalidValue,
    /// A derivative refers to a column which is not an input of the problem.
    #[error("column {col} of row {row} is out of range")]
    ColumnOutOfRange {
        /// The output row being differentiated.
        row: usize,
        /// The reported column.
        col: usize,
    },
    /// A custom error specific to the problem.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// The trait for defining sparse nonlinear least-squares problems.
///
/// The rows of the Jacobian are computed independently and possibly on
/// multiple threads at once, hence the `Sync` requirement.
pub trait SparseProblem: Sync {
    /// Type of the scalar, usually f32 or f64.
    type Field: RealField;

    /// Number of parameters (the length of the input vector).
    fn input_size(&self) -> usize;

    /// Number of outputs (the length of the constraint vector).
    fn output_size(&self) -> usize;

    /// The target the outputs are fitted to. Its length must be
    /// [`output_size`](SparseProblem::output_size).
    fn constraint(&self) -> DVector<Self::Field>;

    /// Computes the outputs `fx` of the model for parameters `p`.
    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError>;

    /// Writes the nonzero entries of the Jacobian row `index` (the derivatives
    /// of output `index` with respect to the parameters) as `(column, value)`
    /// pairs.
    ///
    /// The buffer is empty when the method is called. The order of the pairs
    /// does not matter. If a column is reported multiple times, the last value
    /// wins.
    fn differentiate(
        &self,
        index: usize,
        p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError>;

    /// Resets any internal state of the problem. Called by the solvers before
    /// the solving starts.
    fn reset(&mut self) {}
}

/// Some extensions methods for the [`SparseProblem`] that may be found useful.
pub trait SparseProblemExt: SparseProblem {
    /// Computes the residuals `r = c - f(p)` and returns `|| r ||^2`.
    ///
    /// Non-finite outputs are reported as [`ProblemError::InvalidValue`].
    fn residuals(
        &self,
        constraint: &DVector<Self::Field>,
        p: &DVector<Self::Field>,
        rx: &mut DVector<Self::Field>,
    ) -> Result<Self::Field, ProblemError>;

    /// Computes the error `|| c - f(p) ||^2` at given point.
    fn error_sqr(&self, p: &DVector<Self::Field>) -> Result<Self::Field, ProblemError>;
}

impl<P: SparseProblem + ?Sized> SparseProblemExt for P {
    fn residuals(
        &self,
        constraint: &DVector<Self::Field>,
        p: &DVector<Self::Field>,
        rx: &mut DVector<Self::Field>,
    ) -> Result<Self::Field, ProblemError> {
        if p.len() != self.input_size() || rx.len() != self.output_size() {
            return Err(ProblemError::InvalidDimensionality);
        }

        self.evaluate(p, rx)?;

        // rx = c - f(p)
        rx.neg_mut();
        *rx += constraint;

        if rx.is_all_finite() {
            Ok(rx.norm_l2_squared())
        } else {
            Err(ProblemError::InvalidValue)
        }
    }

    fn error_sqr(&self, p: &DVector<Self::Field>) -> Result<Self::Field, ProblemError> {
        let constraint = self.constraint();
        let mut rx = DVector::zeros(self.output_size());
        self.residuals(&constraint, p, &mut rx)
    }
}
