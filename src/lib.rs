#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Sparsolve
//!
//! A pure Rust implementation of iterative solvers for sparse linear systems
//! and sparse nonlinear least-squares problems.
//!
//! The library targets problems where the matrices involved are large but
//! contain only a few nonzero entries per row, such as those arising in mesh
//! processing, graph problems or discretized differential equations. Matrices
//! are stored in compressed sparse row format and all solvers work in place on
//! [`nalgebra`] vectors.
//!
//! ## Algorithms
//!
//! * [Conjugate gradient](algo::cg) -- For symmetric positive-definite linear
//!   systems.
//! * [BiCGStab](algo::bicgstab) -- For general (non-symmetric) square linear
//!   systems.
//! * [Levenberg-Marquardt](algo::levenberg_marquardt) -- Damped Gauss-Newton
//!   method for nonlinear least squares. Recommended as a default.
//! * [Dog leg](algo::dog_leg) -- Trust region method for nonlinear least
//!   squares combining Gauss-Newton and steepest descent steps.
//!
//! ## Linear systems
//!
//! Sparse matrices are assembled with [`SparseMatrixBuilder`] or from a list
//! of triplets.
//!
//! ```rust
//! use sparsolve::nalgebra as na;
//! use sparsolve::{algo::solve_cg, SparseMatrixBuilder};
//! use na::dvector;
//!
//! // Tridiagonal matrix of a one-dimensional Poisson problem.
//! let n = 5;
//! let mut builder = SparseMatrixBuilder::new(n, n);
//! for i in 0..n {
//!     builder.set(i, i, 2.0);
//!     if i > 0 {
//!         builder.set(i, i - 1, -1.0);
//!     }
//!     if i + 1 < n {
//!         builder.set(i, i + 1, -1.0);
//!     }
//! }
//! let a = builder.build();
//!
//! let b = dvector![1.0, 0.0, 0.0, 0.0, 1.0];
//! let mut x = na::DVector::zeros(n);
//!
//! let report = solve_cg(&a, &b, &mut x, 100, 1e-10, None).expect("valid system");
//! assert!(report.status().is_converged());
//! ```
//!
//! ## Least-squares problems
//!
//! A nonlinear problem is any type that implements the [`SparseProblem`]
//! trait. The solvers minimize the squared error `|| c - f(p) ||^2` between
//! the model outputs `f(p)` and the constraint vector `c`, using the rows of
//! the Jacobian matrix that the problem reports entry by entry.
//!
//! ```rust
//! use sparsolve::nalgebra as na;
//! use sparsolve::{algo::solve_levenberg_marquardt, ProblemError, SparseProblem};
//! use na::{dvector, DVector};
//!
//! // https://en.wikipedia.org/wiki/Rosenbrock_function
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl SparseProblem for Rosenbrock {
//!     type Field = f64;
//!
//!     fn input_size(&self) -> usize {
//!         2
//!     }
//!
//!     fn output_size(&self) -> usize {
//!         2
//!     }
//!
//!     fn constraint(&self) -> DVector<Self::Field> {
//!         DVector::zeros(2)
//!     }
//!
//!     fn evaluate(
//!         &self,
//!         p: &DVector<Self::Field>,
//!         fx: &mut DVector<Self::Field>,
//!     ) -> Result<(), ProblemError> {
//!         fx[0] = self.a - p[0];
//!         fx[1] = self.b.sqrt() * (p[1] - p[0].powi(2));
//!         Ok(())
//!     }
//!
//!     fn differentiate(
//!         &self,
//!         index: usize,
//!         p: &DVector<Self::Field>,
//!         derivative: &mut Vec<(usize, Self::Field)>,
//!     ) -> Result<(), ProblemError> {
//!         match index {
//!             0 => derivative.push((0, -1.0)),
//!             _ => {
//!                 derivative.push((0, -2.0 * self.b.sqrt() * p[0]));
//!                 derivative.push((1, self.b.sqrt()));
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut f = Rosenbrock { a: 1.0, b: 100.0 };
//! let mut p = dvector![-1.2, 1.0];
//!
//! let mut monitor = |iter: usize, error: f64| {
//!     println!("iter = {}\terror = {}", iter, error);
//!     true
//! };
//!
//! let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-12, Some(&mut monitor))
//!     .expect("valid problem");
//!
//! if report.status().is_converged() {
//!     println!("solved: {:?}", p);
//! } else {
//!     println!("terminated: {:?}", report.status());
//! }
//! ```
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
mod core;
pub mod derivatives;
pub mod laplacian;

pub use algo::{solve_bicgstab, solve_cg, solve_dog_leg, solve_levenberg_marquardt};
pub use core::*;

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
