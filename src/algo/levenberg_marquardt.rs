//! Levenberg-Marquardt method.
//!
//! [Levenberg-Marquardt](https://en.wikipedia.org/wiki/Levenberg%E2%80%93Marquardt_algorithm)
//! interpolates between Gauss-Newton and gradient descent. In every iteration
//! it solves the damped normal equations
//!
//! ```text
//! (J^T J + lambda I) step = J^T r,    r = c - f(p)
//! ```
//!
//! where `J` is the sparse Jacobian of the problem. The system is symmetric
//! positive-definite for any positive `lambda`, so it is solved by
//! [conjugate gradient](super::cg) on the Gram matrix shifted by `lambda`,
//! without ever forming the damped matrix. Small `lambda` gives a
//! Gauss-Newton step, large `lambda` a short step in the direction of
//! steepest descent.
//!
//! A step is accepted only if it reduces the error. After an accepted step the
//! damping decreases, after a rejected step it increases and the step is
//! recomputed from the same point. The number of such retries is bounded.
//!
//! # References
//!
//! \[1\] [Methods for Non-Linear Least Squares
//! Problems](https://api.semanticscholar.org/CorpusID:64217935)
//!
//! \[2\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)

use std::mem;

use getset::{CopyGetters, Setters};
use log::{debug, warn};
use nalgebra::{convert, DVector, RealField};

use crate::{
    core::{
        Monitor, Shifted, SolveError, SolveReport, SparseMatrix, SparseProblem,
        SparseProblemExt, Termination, VectorExt,
    },
    derivatives::SparseJacobian,
};

use super::{check_problem, ensure_len, ConjugateGradient};

/// Options for [`LevenbergMarquardt`] solver.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct LevenbergMarquardtOptions<P: SparseProblem> {
    /// Maximum number of iterations. Default: `100`.
    max_iters: usize,
    /// Threshold for the error `|| c - f(p) ||^2` and for its decrease in an
    /// accepted step. Default: `1e-9`.
    tolerance: P::Field,
    /// Threshold for the max-norm of the gradient `J^T r`. Default: `1e-10`.
    gradient_tolerance: P::Field,
    /// Initial damping. Default: `1e-3`.
    lambda_init: P::Field,
    /// Factor applied to the damping after a rejected step. Default: `10`.
    lambda_up: P::Field,
    /// Factor applied to the damping after an accepted step. Default: `0.1`.
    lambda_down: P::Field,
    /// Minimum damping. Default: `1e-12`.
    lambda_min: P::Field,
    /// Maximum damping. Default: `1e12`.
    lambda_max: P::Field,
    /// Number of rejected steps in one iteration after which the solving
    /// ends with [`Termination::Stalled`]. Default: `16`.
    max_rejections: usize,
    /// Iteration budget of the inner conjugate gradient. Default: `500`.
    inner_iters: usize,
    /// Tolerance of the inner conjugate gradient relative to `|| J^T r ||`.
    /// Default: `1e-10`.
    inner_tolerance: P::Field,
}

impl<P: SparseProblem> Default for LevenbergMarquardtOptions<P> {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: convert(1e-9),
            gradient_tolerance: convert(1e-10),
            lambda_init: convert(1e-3),
            lambda_up: convert(10.0),
            lambda_down: convert(0.1),
            lambda_min: convert(1e-12),
            lambda_max: convert(1e12),
            max_rejections: 16,
            inner_iters: 500,
            inner_tolerance: convert(1e-10),
        }
    }
}

/// Levenberg-Marquardt solver.
///
/// See [module](self) documentation for more details.
pub struct LevenbergMarquardt<P: SparseProblem> {
    options: LevenbergMarquardtOptions<P>,
    lambda: P::Field,
    jac: SparseJacobian<P::Field>,
    gram: SparseMatrix<P::Field>,
    cg: ConjugateGradient<P::Field>,
    rx: DVector<P::Field>,
    rx_trial: DVector<P::Field>,
    grad: DVector<P::Field>,
    step: DVector<P::Field>,
    p_trial: DVector<P::Field>,
}

impl<P: SparseProblem> LevenbergMarquardt<P> {
    /// Initializes Levenberg-Marquardt solver with default options.
    pub fn new(problem: &P) -> Self {
        Self::with_options(problem, LevenbergMarquardtOptions::default())
    }

    /// Initializes Levenberg-Marquardt solver with given options.
    pub fn with_options(problem: &P, options: LevenbergMarquardtOptions<P>) -> Self {
        let n = problem.input_size();
        let m = problem.output_size();

        Self {
            lambda: options.lambda_init,
            options,
            jac: SparseJacobian::zeros(problem),
            gram: SparseMatrix::zeros(n, n),
            cg: ConjugateGradient::new(),
            rx: DVector::zeros(m),
            rx_trial: DVector::zeros(m),
            grad: DVector::zeros(n),
            step: DVector::zeros(n),
            p_trial: DVector::zeros(n),
        }
    }

    /// Options of the solver.
    pub fn options(&self) -> &LevenbergMarquardtOptions<P> {
        &self.options
    }

    /// Mutable access to the options.
    pub fn options_mut(&mut self) -> &mut LevenbergMarquardtOptions<P> {
        &mut self.options
    }

    /// Current damping.
    pub fn lambda(&self) -> P::Field {
        self.lambda
    }

    /// Resets the internal state of the solver.
    pub fn reset(&mut self) {
        self.lambda = self.options.lambda_init;
    }

    /// Minimizes `|| c - f(p) ||^2`, starting from and updating `p`.
    pub fn solve(
        &mut self,
        problem: &mut P,
        p: &mut DVector<P::Field>,
    ) -> Result<SolveReport<P::Field>, SolveError> {
        self.solve_with_monitor(problem, p, |_, _| true)
    }

    /// Minimizes `|| c - f(p) ||^2`, starting from and updating `p`.
    ///
    /// The monitor is called after every iteration with the iteration number
    /// and the error. If it returns `false`, the solving stops with
    /// [`Termination::Cancelled`].
    pub fn solve_with_monitor<M>(
        &mut self,
        problem: &mut P,
        p: &mut DVector<P::Field>,
        mut monitor: M,
    ) -> Result<SolveReport<P::Field>, SolveError>
    where
        M: FnMut(usize, P::Field) -> bool,
    {
        check_problem(problem, p)?;

        let n = problem.input_size();
        let m = problem.output_size();

        let constraint = problem.constraint();
        SolveError::check_dim("constraint", m, constraint.len())?;

        problem.reset();
        self.reset();

        let LevenbergMarquardtOptions {
            max_iters,
            tolerance,
            gradient_tolerance,
            lambda_up,
            lambda_down,
            lambda_min,
            lambda_max,
            max_rejections,
            inner_iters,
            inner_tolerance,
            ..
        } = self.options;

        let Self {
            lambda,
            jac,
            gram,
            cg,
            rx,
            rx_trial,
            grad,
            step,
            p_trial,
            ..
        } = self;

        ensure_len(rx, m);
        ensure_len(rx_trial, m);
        ensure_len(grad, n);
        ensure_len(step, n);
        ensure_len(p_trial, n);

        let problem = &*problem;

        let mut error = match problem.residuals(&constraint, p, rx) {
            Ok(error) => error,
            Err(err) => {
                warn!("evaluation in the initial point failed: {}", err);
                return Ok(SolveReport::new(
                    Termination::Breakdown,
                    0,
                    convert(f64::INFINITY),
                ));
            }
        };

        debug!("initial error = {}", error);

        if error <= tolerance {
            return Ok(SolveReport::new(Termination::Converged, 0, error));
        }

        for iter in 1..=max_iters {
            // Linearize the problem in the current point.
            if let Err(err) = jac.compute(problem, p) {
                warn!("differentiation failed in iteration {}: {}", iter, err);
                return Ok(SolveReport::new(Termination::Breakdown, iter - 1, error));
            }

            // g = J^T r
            jac.tr_mul_to(rx, grad);

            let grad_norm = grad.norm_inf();
            if grad_norm <= gradient_tolerance {
                debug!("gradient vanished, || g || = {}", grad_norm);
                return Ok(SolveReport::new(Termination::Converged, iter - 1, error));
            }

            *gram = jac.gram();

            cg.options_mut()
                .set_max_iters(inner_iters)
                .set_tolerance(inner_tolerance * grad.norm_l2());

            let mut rejections = 0;

            let status = loop {
                // Solve (J^T J + lambda I) step = g.
                step.fill(convert(0.0));
                let damped = Shifted::new(&*gram, *lambda);
                let inner = cg.solve(&damped, grad, step)?;

                debug!(
                    "inner solve: {:?} after {} iterations (lambda = {})",
                    inner.status(),
                    inner.iterations(),
                    *lambda
                );

                let trial_error = if step.is_all_finite() {
                    p.add_to(step, p_trial);

                    match problem.residuals(&constraint, p_trial, rx_trial) {
                        Ok(trial_error) => Some(trial_error),
                        Err(err) => {
                            debug!("trial point is invalid: {}", err);
                            None
                        }
                    }
                } else {
                    debug!("step is not finite");
                    None
                };

                match trial_error {
                    Some(trial_error) if trial_error < error => {
                        let decrease = error - trial_error;

                        p.copy_from(p_trial);
                        mem::swap(rx, rx_trial);
                        error = trial_error;

                        let lambda_old = *lambda;
                        *lambda = (lambda_old * lambda_down).max(lambda_min);
                        debug!(
                            "step accepted, error = {}, lambda {} -> {}",
                            error, lambda_old, *lambda
                        );

                        if error <= tolerance || decrease <= tolerance {
                            break Some(Termination::Converged);
                        } else {
                            break None;
                        }
                    }
                    Some(trial_error) if rejections == 0 && trial_error - error <= tolerance => {
                        debug!(
                            "error does not change anymore ({} -> {})",
                            error, trial_error
                        );
                        break Some(Termination::Converged);
                    }
                    _ => {
                        rejections += 1;

                        let lambda_old = *lambda;
                        *lambda = (lambda_old * lambda_up).min(lambda_max);
                        debug!("step rejected, lambda {} -> {}", lambda_old, *lambda);

                        if rejections >= max_rejections {
                            debug!(
                                "solving reached the rejections count limit ({})",
                                max_rejections
                            );
                            break Some(Termination::Stalled);
                        }
                    }
                }
            };

            let proceed = monitor(iter, error);

            if let Some(status) = status {
                return Ok(SolveReport::new(status, iter, error));
            }

            if !proceed {
                debug!("cancelled by monitor in iteration {}", iter);
                return Ok(SolveReport::new(Termination::Cancelled, iter, error));
            }
        }

        Ok(SolveReport::new(Termination::MaxIterations, max_iters, error))
    }
}

/// Minimizes `|| c - f(p) ||^2` of a sparse problem using the
/// Levenberg-Marquardt method, starting from `p`.
///
/// The iteration stops when the error or its decrease drops below
/// `tolerance`, after `max_iters` iterations or when the monitor returns
/// `false`.
pub fn solve_levenberg_marquardt<P: SparseProblem>(
    problem: &mut P,
    p: &mut DVector<P::Field>,
    max_iters: usize,
    tolerance: P::Field,
    monitor: Option<Monitor<'_, P::Field>>,
) -> Result<SolveReport<P::Field>, SolveError> {
    let mut options = LevenbergMarquardtOptions::default();
    options.set_max_iters(max_iters).set_tolerance(tolerance);

    let mut solver = LevenbergMarquardt::with_options(problem, options);
    match monitor {
        Some(monitor) => solver.solve_with_monitor(problem, p, monitor),
        None => solver.solve(problem, p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::ProblemError;
    use crate::laplacian::{uniform_laplacian, LaplacianMatching};
    use crate::testing::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    #[test]
    fn rosenbrock() {
        let mut f = ExtendedRosenbrock::new(2);

        for mut p in f.initials() {
            let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-12, None).unwrap();

            assert!(report.status().is_converged(), "{:?}", report);
            assert!(f.is_optimum(&p, 1e-10));
        }
    }

    #[test]
    fn rosenbrock_reusing_solver() {
        let mut f = ExtendedRosenbrock::new(10);
        let mut solver = LevenbergMarquardt::new(&f);

        for mut p in f.initials() {
            let report = solver.solve(&mut f, &mut p).unwrap();

            assert!(report.status().is_converged(), "{:?}", report);
            assert!(f.is_optimum(&p, 1e-8));
        }
    }

    #[test]
    fn linear_least_squares() {
        let mut f = LinearProblem::random(20, 10, 3);
        let solution = f.solution().unwrap();

        for mut p in f.initials() {
            let report = solve_levenberg_marquardt(&mut f, &mut p, 5, 1e-9, None).unwrap();

            assert!(report.status().is_converged(), "{:?}", report);
            assert!(report.iterations() <= 5);
            assert_abs_diff_eq!(p, solution, epsilon = 1e-6);
        }
    }

    #[test]
    fn error_is_decreasing() {
        let mut f = ExtendedPowell::new(8);
        let mut p = f.initials().remove(0);

        let mut errors = vec![f.error_sqr(&p).unwrap()];
        let mut monitor = |_: usize, error: f64| -> bool {
            errors.push(error);
            true
        };

        solve_levenberg_marquardt(&mut f, &mut p, 30, 1e-12, Some(&mut monitor)).unwrap();

        assert!(errors.windows(2).all(|w| w[1] <= w[0]));
        assert!(errors.last().unwrap() < &1e-3);
    }

    #[test]
    fn monitor_cancels() {
        let mut f = ExtendedPowell::new(4);
        let mut p = f.initials().remove(0);

        let mut monitor = |iter: usize, _: f64| -> bool { iter < 3 };
        let report =
            solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-30, Some(&mut monitor)).unwrap();

        assert_eq!(report.status(), Termination::Cancelled);
        assert_eq!(report.iterations(), 3);
        assert_eq!(report.error(), f.error_sqr(&p).unwrap());
    }

    #[test]
    fn zero_iterations() {
        let mut f = ExtendedRosenbrock::new(2);
        let p0 = dvector![-1.2, 1.0];
        let mut p = p0.clone();

        let report = solve_levenberg_marquardt(&mut f, &mut p, 0, 1e-9, None).unwrap();

        assert_eq!(report.status(), Termination::MaxIterations);
        assert_eq!(report.iterations(), 0);
        assert_eq!(p, p0);
    }

    #[test]
    fn initial_point_is_optimum() {
        let mut f = ExtendedRosenbrock::new(2);
        let mut p = dvector![1.0, 1.0];

        let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-9, None).unwrap();

        assert_eq!(report.status(), Termination::Converged);
        assert_eq!(report.iterations(), 0);
        assert_eq!(p, dvector![1.0, 1.0]);
    }

    #[test]
    fn evaluation_failure() {
        let mut f = Faulty::new(ExtendedRosenbrock::new(2), Fault::Evaluate);
        let mut p = dvector![-1.2, 1.0];

        let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-9, None).unwrap();

        assert_eq!(report.status(), Termination::Breakdown);
        assert_eq!(report.iterations(), 0);
        assert_eq!(p, dvector![-1.2, 1.0]);
    }

    #[test]
    fn differentiation_failure() {
        let mut f = Faulty::new(ExtendedRosenbrock::new(2), Fault::Differentiate);
        let mut p = dvector![-1.2, 1.0];

        let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-9, None).unwrap();

        assert_eq!(report.status(), Termination::Breakdown);
        assert_eq!(report.iterations(), 0);
        assert!(report.error().is_finite());
        assert_eq!(p, dvector![-1.2, 1.0]);
    }

    #[test]
    fn invalid_parameters_length() {
        let mut f = ExtendedRosenbrock::new(2);
        let mut p = dvector![1.0, 2.0, 3.0];

        let result = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-9, None);

        assert!(matches!(result, Err(SolveError::Dimension { .. })));
        assert_eq!(p, dvector![1.0, 2.0, 3.0]);
    }

    struct Resettable {
        resets: usize,
    }

    impl SparseProblem for Resettable {
        type Field = f64;

        fn input_size(&self) -> usize {
            1
        }

        fn output_size(&self) -> usize {
            1
        }

        fn constraint(&self) -> DVector<Self::Field> {
            dvector![2.0]
        }

        fn evaluate(
            &self,
            p: &DVector<Self::Field>,
            fx: &mut DVector<Self::Field>,
        ) -> Result<(), ProblemError> {
            fx[0] = p[0];
            Ok(())
        }

        fn differentiate(
            &self,
            _index: usize,
            _p: &DVector<Self::Field>,
            derivative: &mut Vec<(usize, Self::Field)>,
        ) -> Result<(), ProblemError> {
            derivative.push((0, 1.0));
            Ok(())
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    #[test]
    fn problem_is_reset() {
        let mut f = Resettable { resets: 0 };
        let mut p = dvector![0.0];

        let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-12, None).unwrap();

        assert!(report.status().is_converged());
        assert_eq!(f.resets, 1);
        assert_abs_diff_eq!(p[0], 2.0, epsilon = 1e-6);
    }

    // f(p) = p with a Jacobian of the wrong sign, every step goes uphill.
    struct WrongSign;

    impl SparseProblem for WrongSign {
        type Field = f64;

        fn input_size(&self) -> usize {
            1
        }

        fn output_size(&self) -> usize {
            1
        }

        fn constraint(&self) -> DVector<Self::Field> {
            dvector![2.0]
        }

        fn evaluate(
            &self,
            p: &DVector<Self::Field>,
            fx: &mut DVector<Self::Field>,
        ) -> Result<(), ProblemError> {
            fx[0] = p[0];
            Ok(())
        }

        fn differentiate(
            &self,
            _index: usize,
            _p: &DVector<Self::Field>,
            derivative: &mut Vec<(usize, Self::Field)>,
        ) -> Result<(), ProblemError> {
            derivative.push((0, -1.0));
            Ok(())
        }
    }

    #[test]
    fn rejections_limit() {
        let mut f = WrongSign;
        let mut p = dvector![0.0];

        let report = solve_levenberg_marquardt(&mut f, &mut p, 100, 1e-12, None).unwrap();

        assert_eq!(report.status(), Termination::Stalled);
        assert_eq!(report.iterations(), 1);
        assert_eq!(report.error(), 4.0);
        assert_eq!(p, dvector![0.0]);
    }

    #[test]
    fn single_precision() {
        let n = 6;
        let edges = (0..n - 1).map(|i| (i, i + 1)).collect::<Vec<_>>();
        let l = uniform_laplacian::<f32>(n, &edges);
        let original = dvector![0.0f32, 1.0, 0.0, 1.0, 0.0, 1.0];
        let anchors = vec![(0, 3.0f32), (5, 4.0)];

        let mut f = LaplacianMatching::preserving(l, &original, anchors, 1.0).unwrap();
        let mut p = DVector::zeros(n);

        let report = solve_levenberg_marquardt(&mut f, &mut p, 20, 1e-6, None).unwrap();

        assert!(report.status().is_converged(), "{:?}", report);
        assert_abs_diff_eq!(p, original.add_scalar(3.0), epsilon = 1e-2);
    }
}
