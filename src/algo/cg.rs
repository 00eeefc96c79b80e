//! Conjugate gradient method.
//!
//! [Conjugate gradient](https://en.wikipedia.org/wiki/Conjugate_gradient_method)
//! is the method of choice for symmetric positive-definite systems. It needs
//! only the matrix-vector product, so the matrix can be arbitrarily large as
//! long as it is sparse. No preconditioning is applied.
//!
//! # References
//!
//! \[1\] [An Introduction to the Conjugate Gradient Method Without the
//! Agonizing Pain](https://www.cs.cmu.edu/~quake-papers/painless-conjugate-gradient.pdf)
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use getset::{CopyGetters, Setters};
use log::{debug, warn};
use nalgebra::{convert, DVector};

use crate::core::{
    LinearOperator, Monitor, RealField, SolveError, SolveReport, Termination, VectorExt,
};

use super::{check_linear_system, ensure_len};

/// Options for [`ConjugateGradient`] solver.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct CgOptions<F: RealField> {
    /// Maximum number of iterations. Default: `100`.
    max_iters: usize,
    /// Threshold for the residual norm `|| b - A x ||`. Default: `1e-6`.
    tolerance: F,
}

impl<F: RealField> Default for CgOptions<F> {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: convert(1e-6),
        }
    }
}

/// Conjugate gradient solver.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct ConjugateGradient<F: RealField> {
    options: CgOptions<F>,
    r: DVector<F>,
    dir: DVector<F>,
    a_dir: DVector<F>,
}

impl<F: RealField> ConjugateGradient<F> {
    /// Initializes conjugate gradient solver with default options.
    pub fn new() -> Self {
        Self::with_options(CgOptions::default())
    }

    /// Initializes conjugate gradient solver with given options.
    pub fn with_options(options: CgOptions<F>) -> Self {
        Self {
            options,
            r: DVector::zeros(0),
            dir: DVector::zeros(0),
            a_dir: DVector::zeros(0),
        }
    }

    /// Options of the solver.
    pub fn options(&self) -> &CgOptions<F> {
        &self.options
    }

    /// Mutable access to the options, for solvers that are reused with
    /// varying budgets.
    pub fn options_mut(&mut self) -> &mut CgOptions<F> {
        &mut self.options
    }

    /// Solves `A x = b`, using `x` as the initial guess.
    pub fn solve<A>(
        &mut self,
        a: &A,
        b: &DVector<F>,
        x: &mut DVector<F>,
    ) -> Result<SolveReport<F>, SolveError>
    where
        A: LinearOperator<F> + ?Sized,
    {
        self.solve_with_monitor(a, b, x, |_, _| true)
    }

    /// Solves `A x = b`, using `x` as the initial guess.
    ///
    /// The monitor is called after every iteration with the iteration number
    /// and the norm of the residual. If it returns `false`, the solving stops
    /// with [`Termination::Cancelled`].
    pub fn solve_with_monitor<A, M>(
        &mut self,
        a: &A,
        b: &DVector<F>,
        x: &mut DVector<F>,
        mut monitor: M,
    ) -> Result<SolveReport<F>, SolveError>
    where
        A: LinearOperator<F> + ?Sized,
        M: FnMut(usize, F) -> bool,
    {
        let n = check_linear_system(a, b, x)?;

        let CgOptions {
            max_iters,
            tolerance,
        } = self.options;

        let Self { r, dir, a_dir, .. } = self;
        ensure_len(r, n);
        ensure_len(dir, n);
        ensure_len(a_dir, n);

        let one: F = convert(1.0);

        // r = b - A x
        a.apply(x, r);
        r.neg_mut();
        *r += b;

        let mut r_norm_sqr = r.norm_l2_squared();
        let mut r_norm = r_norm_sqr.sqrt();

        if !r_norm.is_finite() {
            warn!("initial residual is not finite");
            return Ok(SolveReport::new(Termination::Breakdown, 0, r_norm));
        }

        if r_norm <= tolerance {
            debug!("initial guess satisfies the tolerance, || r || = {}", r_norm);
            return Ok(SolveReport::new(Termination::Converged, 0, r_norm));
        }

        dir.copy_from(r);

        for iter in 1..=max_iters {
            a.apply(dir, a_dir);

            let curvature = dir.dot(a_dir);

            // Covers exhausted Krylov subspace, indefinite directions and NaN.
            // Relative to || p || || A p ||, so the scale of A does not matter.
            if !(curvature > F::EPSILON * dir.norm_l2() * a_dir.norm_l2()) {
                warn!(
                    "conjugate gradient breakdown in iteration {} (p^T A p = {})",
                    iter, curvature
                );
                return Ok(SolveReport::new(Termination::Breakdown, iter - 1, r_norm));
            }

            let alpha = r_norm_sqr / curvature;

            x.axpy(alpha, dir, one);
            r.axpy(-alpha, a_dir, one);

            let r_norm_sqr_new = r.norm_l2_squared();
            r_norm = r_norm_sqr_new.sqrt();
            debug!("iteration {}: || r || = {}", iter, r_norm);

            let proceed = monitor(iter, r_norm);

            if r_norm <= tolerance {
                debug!("converged in {} iterations", iter);
                return Ok(SolveReport::new(Termination::Converged, iter, r_norm));
            }

            if !proceed {
                debug!("cancelled by monitor in iteration {}", iter);
                return Ok(SolveReport::new(Termination::Cancelled, iter, r_norm));
            }

            // p = r + beta p
            let beta = r_norm_sqr_new / r_norm_sqr;
            dir.axpy(one, r, beta);
            r_norm_sqr = r_norm_sqr_new;
        }

        Ok(SolveReport::new(Termination::MaxIterations, max_iters, r_norm))
    }
}

impl<F: RealField> Default for ConjugateGradient<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Solves symmetric positive-definite system `A x = b` using the conjugate
/// gradient method, starting from `x`.
///
/// The iteration stops when `|| b - A x || <= tolerance`, after `iters`
/// iterations or when the monitor returns `false`.
pub fn solve_cg<F, A>(
    a: &A,
    b: &DVector<F>,
    x: &mut DVector<F>,
    iters: usize,
    tolerance: F,
    monitor: Option<Monitor<'_, F>>,
) -> Result<SolveReport<F>, SolveError>
where
    F: RealField,
    A: LinearOperator<F> + ?Sized,
{
    let mut options = CgOptions::default();
    options.set_max_iters(iters).set_tolerance(tolerance);

    let mut solver = ConjugateGradient::with_options(options);
    match monitor {
        Some(monitor) => solver.solve_with_monitor(a, b, x, monitor),
        None => solver.solve(a, b, x),
    }
}
