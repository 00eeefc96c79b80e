//! Core abstractions and types for sparsolve.
//!
//! *Users* are mainly interested in [`SparseMatrixBuilder`] for assembling
//! linear systems and in implementing the [`SparseProblem`] trait for
//! nonlinear least-squares problems.
//!
//! Algorithms *developers* are interested in the [`LinearOperator`] trait and
//! the extension traits [`VectorExt`] and [`SparseProblemExt`] as well as the
//! tools in [derivatives](crate::derivatives) module.

mod base;
mod operator;
mod problem;
mod report;
mod sparse;
mod vector;

pub use base::*;
pub use operator::*;
pub use problem::*;
pub use report::*;
pub use sparse::*;
pub use vector::*;
