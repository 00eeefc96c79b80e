//! Biconjugate gradient stabilized method.
//!
//! [BiCGStab](https://en.wikipedia.org/wiki/Biconjugate_gradient_stabilized_method)
//! extends the idea of conjugate gradient to non-symmetric systems. Compared
//! to plain biconjugate gradient, it smooths the convergence by a local
//! minimal residual step in each iteration and does not need the transposed
//! product. Each iteration costs two matrix-vector products.
//!
//! The shadow residual is fixed to the initial residual. When one of the
//! recurrence denominators vanishes, the method cannot continue and the
//! solving ends with [`Termination::Breakdown`], keeping the last iterate that
//! was computed from well-defined quantities.
//!
//! # References
//!
//! \[1\] [Bi-CGSTAB: A Fast and Smoothly Converging Variant of Bi-CG for the
//! Solution of Nonsymmetric Linear Systems](https://doi.org/10.1137/0913035)
//!
//! \[2\] [Templates for the Solution of Linear
//! Systems](https://www.netlib.org/templates/templates.pdf)

use getset::{CopyGetters, Setters};
use log::{debug, warn};
use nalgebra::{convert, DVector};

use crate::core::{
    LinearOperator, Monitor, RealField, SolveError, SolveReport, Termination, VectorExt,
};

use super::{check_linear_system, ensure_len};

/// Options for [`BiCgStab`] solver.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct BiCgStabOptions<F: RealField> {
    /// Maximum number of iterations. Default: `100`.
    max_iters: usize,
    /// Threshold for the residual norm `|| b - A x ||`. Default: `1e-6`.
    tolerance: F,
}

impl<F: RealField> Default for BiCgStabOptions<F> {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: convert(1e-6),
        }
    }
}

/// BiCGStab solver.
///
/// See [module](self) documentation for more details.
#[derive(Debug, Clone)]
pub struct BiCgStab<F: RealField> {
    options: BiCgStabOptions<F>,
    r: DVector<F>,
    r_hat: DVector<F>,
    dir: DVector<F>,
    v: DVector<F>,
    t: DVector<F>,
}

impl<F: RealField> BiCgStab<F> {
    /// Initializes BiCGStab solver with default options.
    pub fn new() -> Self {
        Self::with_options(BiCgStabOptions::default())
    }

    /// Initializes BiCGStab solver with given options.
    pub fn with_options(options: BiCgStabOptions<F>) -> Self {
        Self {
            options,
            r: DVector::zeros(0),
            r_hat: DVector::zeros(0),
            dir: DVector::zeros(0),
            v: DVector::zeros(0),
            t: DVector::zeros(0),
        }
    }

    /// Options of the solver.
    pub fn options(&self) -> &BiCgStabOptions<F> {
        &self.options
    }

    /// Mutable access to the options.
    pub fn options_mut(&mut self) -> &mut BiCgStabOptions<F> {
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

        let BiCgStabOptions {
            max_iters,
            tolerance,
        } = self.options;

        let Self {
            r,
            r_hat,
            dir,
            v,
            t,
            ..
        } = self;
        for work in [&mut *r, &mut *r_hat, &mut *dir, &mut *v, &mut *t] {
            ensure_len(work, n);
        }

        let one: F = convert(1.0);
        let eps = F::EPSILON;

        // r = b - A x
        a.apply(x, r);
        r.neg_mut();
        *r += b;

        let mut r_norm = r.norm_l2();

        if !r_norm.is_finite() {
            warn!("initial residual is not finite");
            return Ok(SolveReport::new(Termination::Breakdown, 0, r_norm));
        }

        if r_norm <= tolerance {
            debug!("initial guess satisfies the tolerance, || r || = {}", r_norm);
            return Ok(SolveReport::new(Termination::Converged, 0, r_norm));
        }

        r_hat.copy_from(r);
        let r_hat_norm = r_norm;

        let mut rho_old = one;
        let mut alpha = one;
        let mut omega = one;

        for iter in 1..=max_iters {
            let rho = r_hat.dot(r);

            if !(rho.abs() > eps * r_hat_norm * r_norm) {
                warn!("BiCGStab breakdown in iteration {} (rho = {})", iter, rho);
                return Ok(SolveReport::new(Termination::Breakdown, iter - 1, r_norm));
            }

            if iter == 1 {
                dir.copy_from(r);
            } else {
                // p = r + beta (p - omega v)
                let beta = (rho / rho_old) * (alpha / omega);
                dir.axpy(-omega, v, one);
                dir.axpy(one, r, beta);
            }

            a.apply(dir, v);

            let r_hat_v = r_hat.dot(v);
            let v_norm = v.norm_l2();
            if !(r_hat_v.abs() > eps * r_hat_norm * v_norm) {
                warn!(
                    "BiCGStab breakdown in iteration {} (r_hat^T v = {})",
                    iter, r_hat_v
                );
                return Ok(SolveReport::new(Termination::Breakdown, iter - 1, r_norm));
            }

            alpha = rho / r_hat_v;

            // s = r - alpha v, stored in r.
            let s = &mut *r;
            s.axpy(-alpha, v, one);
            let s_norm = s.norm_l2();

            if s_norm <= tolerance {
                x.axpy(alpha, dir, one);
                r_norm = s_norm;
                debug!("iteration {}: || s || = {}", iter, s_norm);
                monitor(iter, r_norm);
                debug!("converged in {} iterations (half step)", iter);
                return Ok(SolveReport::new(Termination::Converged, iter, r_norm));
            }

            a.apply(s, t);

            // || A || is estimated by || v || / || p ||.
            let t_norm = t.norm_l2();
            let a_norm = v_norm / dir.norm_l2();
            if !(t_norm > eps * a_norm * s_norm) || !t_norm.is_finite() {
                // The half step is still well-defined and its residual is s.
                x.axpy(alpha, dir, one);
                warn!("BiCGStab breakdown in iteration {} (|| t || = {})", iter, t_norm);
                return Ok(SolveReport::new(Termination::Breakdown, iter, s_norm));
            }

            let t_s = t.dot(s);
            omega = t_s / (t_norm * t_norm);

            x.axpy(alpha, dir, one);
            x.axpy(omega, s, one);

            // r = s - omega t
            s.axpy(-omega, t, one);
            r_norm = r.norm_l2();
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

            if !(t_s.abs() > eps * t_norm * s_norm) || !r_norm.is_finite() {
                warn!("BiCGStab breakdown in iteration {} (omega = {})", iter, omega);
                return Ok(SolveReport::new(Termination::Breakdown, iter, r_norm));
            }

            rho_old = rho;
        }

        Ok(SolveReport::new(Termination::MaxIterations, max_iters, r_norm))
    }
}

impl<F: RealField> Default for BiCgStab<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Solves general system `A x = b` using the BiCGStab method, starting from
/// `x`.
///
/// The iteration stops when `|| b - A x || <= tolerance`, after `iters`
/// iterations or when the monitor returns `false`.
pub fn solve_bicgstab<F, A>(
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
    let mut options = BiCgStabOptions::default();
    options.set_max_iters(iters).set_tolerance(tolerance);

    let mut solver = BiCgStab::with_options(options);
    match monitor {
        Some(monitor) => solver.solve_with_monitor(a, b, x, monitor),
        None => solver.solve(a, b, x),
    }
}
