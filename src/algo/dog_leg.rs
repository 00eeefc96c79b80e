//! Powell's dog-leg trust region method.
//!
//! [Dog-leg](https://en.wikipedia.org/wiki/Powell%27s_dog_leg_method) combines
//! the Gauss-Newton step `h_gn`, the solution of `J^T J h = J^T r`, with the
//! steepest descent step minimizing the linear model along the gradient
//! `g = J^T r`, the Cauchy point `h_c = (|| g ||^2 / || J g ||^2) g`. The step
//! is chosen along the path `0 -> h_c -> h_gn` so that it stays within the
//! trust region of radius `delta`:
//!
//! * the full Gauss-Newton step if it lies inside the region,
//! * the Cauchy step scaled to the boundary if even the Cauchy point lies
//!   outside,
//! * the intersection of the segment `h_c -> h_gn` with the boundary
//!   otherwise.
//!
//! The quality of the linear model is measured by the gain ratio of the actual
//! and predicted reduction of the error. The radius grows when the model is
//! good and shrinks when it is poor. A step is taken only if the gain ratio
//! exceeds the acceptance threshold, otherwise the parameters stay untouched.
//!
//! The Gauss-Newton system is solved by [conjugate gradient](super::cg) on the
//! Gram matrix `J^T J`, which never needs a dense factorization.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Methods for Non-Linear Least Squares
//! Problems](https://api.semanticscholar.org/CorpusID:64217935)

use std::mem;

use getset::{CopyGetters, Setters};
use log::{debug, warn};
use nalgebra::{convert, ComplexField, DVector, RealField as _};

use crate::{
    core::{
        Monitor, RealField, SolveError, SolveReport, SparseMatrix, SparseProblem, SparseProblemExt,
        Termination, VectorExt,
    },
    derivatives::SparseJacobian,
};

use super::{check_problem, ensure_len, ConjugateGradient};

/// Options for [`DogLeg`] solver.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct DogLegOptions<P: SparseProblem> {
    /// Maximum number of iterations. Default: `100`.
    max_iters: usize,
    /// Threshold for the error `|| c - f(p) ||^2` and for its decrease in an
    /// accepted step. Default: `1e-9`.
    tolerance: P::Field,
    /// Threshold for the max-norm of the gradient `J^T r`. Default: `1e-10`.
    gradient_tolerance: P::Field,
    /// Initial trust region size. Default: `1e3`.
    delta_init: P::Field,
    /// Minimum allowed trust region size. Default: `f64::EPSILON.sqrt()`.
    delta_min: P::Field,
    /// Maximum allowed trust region size. Default: `1e9`.
    delta_max: P::Field,
    /// Threshold for gain ratio that needs to be exceeded to accept the
    /// calculated step. Default: `0.0001`.
    accept_thresh: P::Field,
    /// Threshold for gain ratio to shrink trust region size if lower. Default:
    /// `0.25`.
    shrink_thresh: P::Field,
    /// Threshold for gain ratio to expand trust region size if higher. Default:
    /// `0.75`.
    expand_thresh: P::Field,
    /// Number of consecutive step rejections after which the solving ends
    /// with [`Termination::Stalled`]. Default: `10`.
    rejections_thresh: usize,
    /// Iteration budget of the inner conjugate gradient. Default: `500`.
    inner_iters: usize,
    /// Tolerance of the inner conjugate gradient relative to `|| J^T r ||`.
    /// Default: `1e-10`.
    inner_tolerance: P::Field,
}

impl<P: SparseProblem> Default for DogLegOptions<P> {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: convert(1e-9),
            gradient_tolerance: convert(1e-10),
            delta_init: convert(1e3),
            delta_min: P::Field::EPSILON_SQRT,
            delta_max: convert(1e9),
            accept_thresh: convert(0.0001),
            shrink_thresh: convert(0.25),
            expand_thresh: convert(0.75),
            rejections_thresh: 10,
            inner_iters: 500,
            inner_tolerance: convert(1e-10),
        }
    }
}

/// Dog-leg solver.
///
/// See [module](self) documentation for more details.
pub struct DogLeg<P: SparseProblem> {
    options: DogLegOptions<P>,
    delta: P::Field,
    jac: SparseJacobian<P::Field>,
    gram: SparseMatrix<P::Field>,
    cg: ConjugateGradient<P::Field>,
    rx: DVector<P::Field>,
    rx_trial: DVector<P::Field>,
    grad: DVector<P::Field>,
    newton: DVector<P::Field>,
    cauchy: DVector<P::Field>,
    step: DVector<P::Field>,
    p_trial: DVector<P::Field>,
    temp: DVector<P::Field>,
}

impl<P: SparseProblem> DogLeg<P> {
    /// Initializes dog-leg solver with default options.
    pub fn new(problem: &P) -> Self {
        Self::with_options(problem, DogLegOptions::default())
    }

    /// Initializes dog-leg solver with given options.
    pub fn with_options(problem: &P, options: DogLegOptions<P>) -> Self {
        let n = problem.input_size();
        let m = problem.output_size();

        Self {
            delta: options.delta_init,
            options,
            jac: SparseJacobian::zeros(problem),
            gram: SparseMatrix::zeros(n, n),
            cg: ConjugateGradient::new(),
            rx: DVector::zeros(m),
            rx_trial: DVector::zeros(m),
            grad: DVector::zeros(n),
            newton: DVector::zeros(n),
            cauchy: DVector::zeros(n),
            step: DVector::zeros(n),
            p_trial: DVector::zeros(n),
            temp: DVector::zeros(m),
        }
    }

    /// Options of the solver.
    pub fn options(&self) -> &DogLegOptions<P> {
        &self.options
    }

    /// Mutable access to the options.
    pub fn options_mut(&mut self) -> &mut DogLegOptions<P> {
        &mut self.options
    }

    /// Current trust region size.
    pub fn delta(&self) -> P::Field {
        self.delta
    }

    /// Resets the internal state of the solver.
    pub fn reset(&mut self) {
        self.delta = self.options.delta_init;
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
    /// The monitor is called after every iteration (accepted or rejected
    /// step) with the iteration number and the error. If it returns `false`,
    /// the solving stops with [`Termination::Cancelled`].
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

        let DogLegOptions {
            max_iters,
            tolerance,
            gradient_tolerance,
            delta_min,
            delta_max,
            accept_thresh,
            shrink_thresh,
            expand_thresh,
            rejections_thresh,
            inner_iters,
            inner_tolerance,
            ..
        } = self.options;

        let Self {
            delta,
            jac,
            gram,
            cg,
            rx,
            rx_trial,
            grad,
            newton,
            cauchy,
            step,
            p_trial,
            temp,
            ..
        } = self;

        ensure_len(rx, m);
        ensure_len(rx_trial, m);
        ensure_len(temp, m);
        ensure_len(grad, n);
        ensure_len(newton, n);
        ensure_len(cauchy, n);
        ensure_len(step, n);
        ensure_len(p_trial, n);

        let problem = &*problem;

        let zero: P::Field = convert(0.0);
        let half: P::Field = convert(0.5);

        #[derive(Debug, Clone, Copy, PartialEq)]
        enum StepType {
            GaussNewton,
            ScaledCauchy,
            Cauchy,
            DogLeg,
        }

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

        let mut linearize = true;
        let mut is_newton_valid = false;
        let mut newton_norm = zero;
        let mut cauchy_norm = zero;
        let mut rejections_cnt = 0;

        for iter in 1..=max_iters {
            if linearize {
                // Compute J(p), the gradient and both candidate steps. These
                // stay valid until a step is accepted.
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

                // Gauss-Newton step from J^T J h_gn = g.
                *gram = jac.gram();

                let grad_norm_l2 = grad.norm_l2();
                cg.options_mut()
                    .set_max_iters(inner_iters)
                    .set_tolerance(inner_tolerance * grad_norm_l2);

                newton.fill(zero);
                let inner = cg.solve(&*gram, grad, newton)?;
                newton_norm = newton.norm_l2();
                is_newton_valid = newton.is_all_finite() && newton_norm > zero;

                debug!(
                    "Gauss-Newton inner solve: {:?} after {} iterations",
                    inner.status(),
                    inner.iterations()
                );

                if !is_newton_valid {
                    debug!("Gauss-Newton step is invalid");
                }

                // Cauchy point h_c = (|| g ||^2 / || J g ||^2) g.
                jac.mul_to(grad, temp);
                let tau = grad_norm_l2 * grad_norm_l2 / temp.norm_l2_squared();

                cauchy.copy_from(grad);
                *cauchy *= tau;
                cauchy_norm = cauchy.norm_l2();

                linearize = false;
            }

            let step_type = if is_newton_valid && newton_norm <= *delta {
                // Gauss-Newton step is inside the trust region. We can safely
                // take it.
                step.copy_from(newton);
                debug!("take full Gauss-Newton: {:?}", step.as_slice());
                StepType::GaussNewton
            } else if cauchy_norm >= *delta {
                // Cauchy point is outside the trust region. We take the
                // steepest descent to the trust region boundary.
                step.copy_from(cauchy);
                *step *= *delta / cauchy_norm;
                debug!(
                    "take scaled Cauchy to trust region boundary: {:?}",
                    step.as_slice()
                );
                StepType::ScaledCauchy
            } else if is_newton_valid {
                // The boundary is crossed by the path h(alpha) = h_c + alpha
                // (h_gn - h_c) for alpha in (0, 1). With
                //
                //     a = || h_gn - h_c ||^2
                //     b = h_c^T (h_gn - h_c)
                //     c = || h_c ||^2 - delta^2 < 0
                //
                // the positive root of a alpha^2 + 2b alpha + c = 0 is computed
                // without subtracting numbers of similar magnitude.
                newton.sub_to(cauchy, step);

                let a = step.norm_l2_squared();
                let b = cauchy.dot(step);
                let c_neg = *delta * *delta - cauchy_norm * cauchy_norm;

                #[allow(clippy::suspicious_operation_groupings)]
                let d = (b * b + a * c_neg).sqrt();
                let alpha = if b <= zero {
                    (-b + d) / a
                } else {
                    c_neg / (b + d)
                };

                *step *= alpha;
                *step += &*cauchy;
                debug!("take dog-leg (factor = {}): {:?}", alpha, step.as_slice());
                StepType::DogLeg
            } else {
                step.copy_from(cauchy);
                debug!("take full Cauchy: {:?}", step.as_slice());
                StepType::Cauchy
            };

            let step_norm = step.norm_l2();

            // Compute r(p') for the candidate p' = p + h.
            p.add_to(step, p_trial);
            let trial_error = match problem.residuals(&constraint, p_trial, rx_trial) {
                Ok(trial_error) => Some(trial_error),
                Err(err) => {
                    debug!("trial point is invalid: {}", err);
                    None
                }
            };

            let gain_ratio = match trial_error {
                Some(trial_error) => {
                    // predicted = 1/2 || r ||^2 - 1/2 || r - J h ||^2
                    jac.mul_to(step, temp);
                    temp.neg_mut();
                    *temp += &*rx;
                    let predicted = half * (error - temp.norm_l2_squared());

                    if predicted <= zero {
                        debug!("predicted gain <= 0");
                        zero
                    } else {
                        let actual = half * (error - trial_error);
                        let gain_ratio = actual / predicted;
                        debug!("gain ratio = {} / {} = {}", actual, predicted, gain_ratio);

                        gain_ratio
                    }
                }
                None => {
                    debug!("trial step is invalid, gain ratio = 0");
                    zero
                }
            };

            let mut status = None;

            // Decide if the step is accepted or not.
            match trial_error {
                Some(trial_error) if gain_ratio > accept_thresh && trial_error < error => {
                    let decrease = error - trial_error;

                    p.copy_from(p_trial);
                    mem::swap(rx, rx_trial);
                    error = trial_error;
                    debug!("step accepted ({:?}), error = {}", step_type, error);

                    rejections_cnt = 0;
                    linearize = true;

                    if error <= tolerance || decrease <= tolerance {
                        status = Some(Termination::Converged);
                    }
                }
                Some(trial_error)
                    if step_type == StepType::GaussNewton
                        && (trial_error - error).abs() <= tolerance =>
                {
                    debug!(
                        "error does not change anymore ({} -> {})",
                        error, trial_error
                    );
                    status = Some(Termination::Converged);
                }
                _ => {
                    debug!("step rejected, threshold for accepting = {}", accept_thresh);
                    rejections_cnt += 1;

                    if rejections_cnt == rejections_thresh {
                        debug!(
                            "solving reached the rejections count limit ({})",
                            rejections_thresh
                        );
                        status = Some(Termination::Stalled);
                    }
                }
            }

            // Potentially update the size of the trust region.
            let delta_old = *delta;
            if gain_ratio < shrink_thresh {
                *delta = (delta_old * convert(0.25))
                    .min(step_norm * convert(0.25))
                    .max(delta_min);
                debug!(
                    "shrink delta from {} to {} (|| h || = {})",
                    delta_old, *delta, step_norm
                );
            } else if gain_ratio > expand_thresh {
                *delta = (delta_old * convert(2.0))
                    .max(step_norm * convert(3.0))
                    .min(delta_max);
                debug!(
                    "expand delta from {} to {} (|| h || = {})",
                    delta_old, *delta, step_norm
                );
            }

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

/// Minimizes `|| c - f(p) ||^2` of a sparse problem using the dog-leg trust
/// region method with initial trust region size `trust`, starting from `p`.
///
/// The iteration stops when the error or its decrease drops below
/// `tolerance`, after `max_iters` iterations or when the monitor returns
/// `false`.
pub fn solve_dog_leg<P: SparseProblem>(
    problem: &mut P,
    p: &mut DVector<P::Field>,
    max_iters: usize,
    tolerance: P::Field,
    trust: P::Field,
    monitor: Option<Monitor<'_, P::Field>>,
) -> Result<SolveReport<P::Field>, SolveError> {
    let mut options = DogLegOptions::default();
    options
        .set_max_iters(max_iters)
        .set_tolerance(tolerance)
        .set_delta_init(trust);

    let mut solver = DogLeg::with_options(problem, options);
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
            let report = solve_dog_leg(&mut f, &mut p, 100, 1e-12, 1e3, None).unwrap();

            assert!(report.status().is_converged(), "{:?}", report);
            assert!(f.is_optimum(&p, 1e-10));
        }
    }

    #[test]
    fn rosenbrock_small_trust_region() {
        let mut f = ExtendedRosenbrock::new(6);

        for mut p in f.initials() {
            let report = solve_dog_leg(&mut f, &mut p, 200, 1e-12, 0.1, None).unwrap();

            assert!(report.status().is_converged(), "{:?}", report);
            assert!(f.is_optimum(&p, 1e-10));
        }
    }

    #[test]
    fn linear_least_squares() {
        let mut f = LinearProblem::random(20, 10, 5);
        let solution = f.solution().unwrap();

        for mut p in f.initials() {
            let mut solver = DogLeg::new(&f);
            let report = solver.solve(&mut f, &mut p).unwrap();

            assert!(report.status().is_converged(), "{:?}", report);
            assert_abs_diff_eq!(p, solution, epsilon = 1e-6);
        }
    }

    #[test]
    fn error_is_monotonic() {
        let mut f = ExtendedPowell::new(8);
        let mut p = f.initials().remove(0);
        let powell = errors_along(&mut f, &mut p, 1.0);

        let mut f = ExtendedRosenbrock::new(4);
        let mut p = f.initials().remove(1);
        let rosenbrock_far = errors_along(&mut f, &mut p, 1e3);

        let mut f = ExtendedRosenbrock::new(4);
        let mut p = f.initials().remove(0);
        let rosenbrock_small = errors_along(&mut f, &mut p, 1e-2);

        for errors in [powell, rosenbrock_far, rosenbrock_small] {
            assert!(errors.len() > 1);
            assert!(errors.windows(2).all(|w| w[1] <= w[0]), "{:?}", errors);
        }
    }

    fn errors_along<P: TestProblem<Field = f64>>(
        f: &mut P,
        p: &mut DVector<f64>,
        trust: f64,
    ) -> Vec<f64> {
        let mut errors = vec![f.error_sqr(p).unwrap()];
        let mut monitor = |_: usize, error: f64| -> bool {
            errors.push(error);
            true
        };

        solve_dog_leg(f, p, 50, 1e-15, trust, Some(&mut monitor)).unwrap();
        errors
    }

    #[test]
    fn rejected_step_keeps_parameters() {
        // Residual 1 - exp(p) with a trust region so large that the first
        // Gauss-Newton step overshoots.
        struct Steep;

        impl SparseProblem for Steep {
            type Field = f64;

            fn input_size(&self) -> usize {
                1
            }

            fn output_size(&self) -> usize {
                1
            }

            fn constraint(&self) -> DVector<Self::Field> {
                dvector![0.0]
            }

            fn evaluate(
                &self,
                p: &DVector<Self::Field>,
                fx: &mut DVector<Self::Field>,
            ) -> Result<(), ProblemError> {
                fx[0] = 1.0 - p[0].exp();
                Ok(())
            }

            fn differentiate(
                &self,
                _index: usize,
                p: &DVector<Self::Field>,
                derivative: &mut Vec<(usize, Self::Field)>,
            ) -> Result<(), ProblemError> {
                derivative.push((0, -p[0].exp()));
                Ok(())
            }
        }

        let mut f = Steep;
        let p0 = dvector![-5.0];
        let mut p = p0.clone();

        // The Gauss-Newton step from -5 is exp(5) - 1, far beyond the root
        // in 0, where the error is enormous.
        let mut monitor = |iter: usize, _: f64| -> bool { iter < 1 };
        let report = solve_dog_leg(&mut f, &mut p, 100, 1e-12, 1e3, Some(&mut monitor)).unwrap();

        assert_eq!(report.status(), Termination::Cancelled);
        assert_eq!(report.iterations(), 1);
        assert_eq!(p, p0);

        // Afterwards the trust region shrinks and the solving succeeds.
        let report = solve_dog_leg(&mut f, &mut p, 200, 1e-12, 1e3, None).unwrap();
        assert!(report.status().is_converged(), "{:?}", report);
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn monitor_cancels() {
        let mut f = ExtendedPowell::new(4);
        let mut p = f.initials().remove(0);

        let mut monitor = |iter: usize, _: f64| -> bool { iter < 3 };
        let report =
            solve_dog_leg(&mut f, &mut p, 100, 1e-30, 1e3, Some(&mut monitor)).unwrap();

        assert_eq!(report.status(), Termination::Cancelled);
        assert_eq!(report.iterations(), 3);
    }

    #[test]
    fn zero_iterations() {
        let mut f = ExtendedPowell::new(4);
        let p0 = f.initials().remove(0);
        let mut p = p0.clone();

        let report = solve_dog_leg(&mut f, &mut p, 0, 1e-9, 1e3, None).unwrap();

        assert_eq!(report.iterations(), 0);
        assert_eq!(p, p0);
    }

    #[test]
    fn evaluation_failure() {
        let mut f = Faulty::new(ExtendedRosenbrock::new(2), Fault::Evaluate);
        let mut p = dvector![-1.2, 1.0];

        let report = solve_dog_leg(&mut f, &mut p, 100, 1e-9, 1e3, None).unwrap();

        assert_eq!(report.status(), Termination::Breakdown);
        assert_eq!(p, dvector![-1.2, 1.0]);
    }

    #[test]
    fn differentiation_failure() {
        let mut f = Faulty::new(ExtendedPowell::new(4), Fault::Differentiate);
        let p0 = dvector![3.0, -1.0, 0.0, 1.0];
        let mut p = p0.clone();

        let report = solve_dog_leg(&mut f, &mut p, 100, 1e-9, 1e3, None).unwrap();

        assert_eq!(report.status(), Termination::Breakdown);
        assert_eq!(report.iterations(), 0);
        assert_eq!(p, p0);
    }

    #[test]
    fn empty_problem() {
        let mut f = LinearProblem::new(SparseMatrix::zeros(0, 0), DVector::zeros(0));
        let mut p = DVector::zeros(0);

        let result = solve_dog_leg(&mut f, &mut p, 100, 1e-9, 1e3, None);
        assert!(matches!(result, Err(SolveError::Empty)));
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

        let report = solve_dog_leg(&mut f, &mut p, 100, 1e-12, 1e3, None).unwrap();

        assert_eq!(report.status(), Termination::Stalled);
        assert_eq!(report.iterations(), 10);
        assert_eq!(report.error(), 4.0);
        assert_eq!(p, dvector![0.0]);
    }

    #[test]
    fn tiny_jacobian_takes_gauss_newton() {
        let a = SparseMatrix::from_triplets(2, 2, [(0, 0, 1e-9), (1, 1, 2e-9)]);
        let b = dvector![1e-9, 2e-9];
        let mut f = LinearProblem::new(a, b);
        let mut p = DVector::zeros(2);

        let mut options = DogLegOptions::<LinearProblem>::default();
        options.set_tolerance(1e-40).set_gradient_tolerance(0.0);

        let mut solver = DogLeg::with_options(&f, options);
        let report = solver.solve(&mut f, &mut p).unwrap();

        // A single Gauss-Newton step solves a linear problem.
        assert_eq!(report.status(), Termination::Converged);
        assert_eq!(report.iterations(), 1);
        assert_abs_diff_eq!(p, dvector![1.0, 1.0], epsilon = 1e-6);
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

        let report = solve_dog_leg(&mut f, &mut p, 20, 1e-6, 1e3, None).unwrap();

        assert!(report.status().is_converged(), "{:?}", report);
        assert_abs_diff_eq!(p, original.add_scalar(3.0), epsilon = 1e-2);
    }
}
