//! Testing problems and utilities useful for benchmarking, debugging and smoke
//! testing.
//!
//! [`ExtendedRosenbrock`] and [`LinearProblem`] are recommended for first
//! tests. Others can be used for specific conditions (e.g., singular Jacobian
//! matrix in the solution or a problem that fails to evaluate).
//!
//! Random linear systems for the Krylov solvers are generated by
//! [`random_spd`] and [`random_diagonally_dominant`]. All generators are
//! seeded, so the systems are reproducible.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use nalgebra::DVector;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal, Uniform};

use crate::core::{
    ProblemError, SparseMatrix, SparseMatrixBuilder, SparseProblem, SparseProblemExt,
};

/// Extension of the [`SparseProblem`] trait that provides additional
/// information that is useful for testing solvers.
pub trait TestProblem: SparseProblem {
    /// Standard initial values for the problem. Using the same initial values
    /// is essential for fair comparison of methods.
    fn initials(&self) -> Vec<DVector<Self::Field>>;

    /// A set of global optima (if known and finite). This is mostly just for
    /// information, for example to know how close a solver got even if it
    /// failed. For testing if a given point is an optimum,
    /// [`TestProblem::is_optimum`] should be used.
    fn optima(&self) -> Vec<DVector<Self::Field>> {
        Vec::new()
    }

    /// Test if given point is an optimum of the problem, given the tolerance
    /// `eps`. The default implementation assumes that the residuals vanish in
    /// the optimum.
    fn is_optimum(&self, p: &DVector<Self::Field>, eps: Self::Field) -> bool {
        self.error_sqr(p).map(|error| error <= eps).unwrap_or(false)
    }
}

/// [Extended Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\] (also
/// known as Rosenbrock's valley or banana function) in the residual form.
///
/// The global minimum is inside a long, narrow, parabolic shaped flat valley.
/// The challenge is to find the solution inside the valley. Every residual
/// depends on at most two parameters, so the Jacobian is block diagonal.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedRosenbrock {
    n: usize,
    alpha: f64,
}

impl ExtendedRosenbrock {
    /// Initializes the problem with given dimension.
    ///
    /// The dimension **must** be a multiplier of 2.
    pub fn new(n: usize) -> Self {
        Self::with_scaling(n, 1.0)
    }

    /// Initializes the problem with given dimension and scaling factor.
    ///
    /// The dimension **must** be a multiplier of 2. The higher the scaling
    /// factor is, the more difficult the problem is.
    pub fn with_scaling(n: usize, alpha: f64) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 2 == 0, "n must be a multiple of 2");
        assert!(alpha > 0.0, "alpha must be greater than zero");
        Self { n, alpha }
    }
}

impl Default for ExtendedRosenbrock {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SparseProblem for ExtendedRosenbrock {
    type Field = f64;

    fn input_size(&self) -> usize {
        self.n
    }

    fn output_size(&self) -> usize {
        self.n
    }

    fn constraint(&self) -> DVector<Self::Field> {
        DVector::zeros(self.n)
    }

    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        for i in 0..(self.n / 2) {
            let i1 = 2 * i;
            let i2 = 2 * i + 1;

            let x1 = p[i1] * self.alpha;
            let x2 = p[i2] / self.alpha;

            fx[i1] = 10.0 * (x2 - x1 * x1);
            fx[i2] = 1.0 - x1;
        }

        Ok(())
    }

    fn differentiate(
        &self,
        index: usize,
        p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError> {
        let i1 = index - index % 2;
        let i2 = i1 + 1;

        if index % 2 == 0 {
            let x1 = p[i1] * self.alpha;
            derivative.push((i1, -20.0 * x1 * self.alpha));
            derivative.push((i2, 10.0 / self.alpha));
        } else {
            derivative.push((i1, -self.alpha));
        }

        Ok(())
    }
}

impl TestProblem for ExtendedRosenbrock {
    fn initials(&self) -> Vec<DVector<Self::Field>> {
        let init1 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { -1.2 } else { 1.0 }),
        );

        let init2 = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 6.39 } else { -0.221 }),
        );

        vec![init1, init2]
    }

    fn optima(&self) -> Vec<DVector<Self::Field>> {
        let optimum = (0..self.n).map(|i| {
            if i % 2 == 0 {
                1.0 / self.alpha
            } else {
                self.alpha
            }
        });

        vec![DVector::from_iterator(self.n, optimum)]
    }
}

/// Extended Powell function \[1,2\].
///
/// The Jacobian matrix is singular in the solution, hence the solvers
/// converge only linearly.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedPowell {
    n: usize,
}

impl ExtendedPowell {
    /// Initializes the problem with given dimension.
    ///
    /// The dimension **must** be a multiplier of 4.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 4 == 0, "n must be a multiple of 4");
        Self { n }
    }
}

impl Default for ExtendedPowell {
    fn default() -> Self {
        Self::new(4)
    }
}

impl SparseProblem for ExtendedPowell {
    type Field = f64;

    fn input_size(&self) -> usize {
        self.n
    }

    fn output_size(&self) -> usize {
        self.n
    }

    fn constraint(&self) -> DVector<Self::Field> {
        DVector::zeros(self.n)
    }

    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        for i in 0..(self.n / 4) {
            let i1 = 4 * i;
            let i2 = 4 * i + 1;
            let i3 = 4 * i + 2;
            let i4 = 4 * i + 3;

            fx[i1] = p[i1] + 10.0 * p[i2];
            fx[i2] = 5f64.sqrt() * (p[i3] - p[i4]);
            fx[i3] = (p[i2] - 2.0 * p[i3]).powi(2);
            fx[i4] = 10f64.sqrt() * (p[i1] - p[i4]).powi(2);
        }

        Ok(())
    }

    fn differentiate(
        &self,
        index: usize,
        p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError> {
        let i1 = index - index % 4;
        let i2 = i1 + 1;
        let i3 = i1 + 2;
        let i4 = i1 + 3;

        match index % 4 {
            0 => derivative.extend([(i1, 1.0), (i2, 10.0)]),
            1 => derivative.extend([(i3, 5f64.sqrt()), (i4, -(5f64.sqrt()))]),
            2 => {
                let d = p[i2] - 2.0 * p[i3];
                derivative.extend([(i2, 2.0 * d), (i3, -4.0 * d)]);
            }
            _ => {
                let d = p[i1] - p[i4];
                let c = 2.0 * 10f64.sqrt();
                derivative.extend([(i1, c * d), (i4, -c * d)]);
            }
        }

        Ok(())
    }
}

impl TestProblem for ExtendedPowell {
    fn initials(&self) -> Vec<DVector<Self::Field>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| match i % 4 {
                0 => 3.0,
                1 => -1.0,
                2 => 0.0,
                _ => 1.0,
            }),
        );

        vec![init]
    }

    fn optima(&self) -> Vec<DVector<Self::Field>> {
        vec![DVector::zeros(self.n)]
    }
}

/// Linear least-squares problem `min || b - A p ||^2` with a sparse matrix.
///
/// A single Gauss-Newton step from any point lands in the solution, which
/// makes it suitable for checking the exactness of nonlinear solvers. The
/// residuals do not vanish in the optimum unless `b` is in the range of `A`.
#[derive(Debug, Clone)]
pub struct LinearProblem {
    a: SparseMatrix<f64>,
    b: DVector<f64>,
}

impl LinearProblem {
    /// Initializes the problem with given matrix and target.
    pub fn new(a: SparseMatrix<f64>, b: DVector<f64>) -> Self {
        assert_eq!(a.nrows(), b.len(), "target length must match matrix rows");
        Self { a, b }
    }

    /// Generates a random overdetermined problem with `m` residuals and `n`
    /// parameters (`m >= n`). The matrix has full column rank.
    pub fn random(m: usize, n: usize, seed: u64) -> Self {
        assert!(m >= n, "problem must not be underdetermined");

        let mut rng = StdRng::seed_from_u64(seed);
        let offdiag = Uniform::new_inclusive(-1.0, 1.0);
        let mut builder = SparseMatrixBuilder::new(m, n);

        for i in 0..m {
            for _ in 0..3 {
                let j = rng.gen_range(0..n);
                if i >= n || j != i {
                    builder.set(i, j, offdiag.sample(&mut rng));
                }
            }

            // The top square block is strictly diagonally dominant.
            if i < n {
                builder.set(i, i, 4.0);
            }
        }

        Self::new(builder.build(), random_vector(m, seed.wrapping_add(1)))
    }

    /// The system matrix.
    pub fn matrix(&self) -> &SparseMatrix<f64> {
        &self.a
    }

    /// The target vector.
    pub fn target(&self) -> &DVector<f64> {
        &self.b
    }

    /// Computes the least-squares solution densely from the normal equations.
    pub fn solution(&self) -> Option<DVector<f64>> {
        let a = self.a.to_dense();
        let a_tr = a.transpose();
        (&a_tr * &a)
            .cholesky()
            .map(|chol| chol.solve(&(&a_tr * &self.b)))
    }
}

impl SparseProblem for LinearProblem {
    type Field = f64;

    fn input_size(&self) -> usize {
        self.a.ncols()
    }

    fn output_size(&self) -> usize {
        self.a.nrows()
    }

    fn constraint(&self) -> DVector<Self::Field> {
        self.b.clone()
    }

    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        self.a.mul_to(p, fx);
        Ok(())
    }

    fn differentiate(
        &self,
        index: usize,
        _p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError> {
        derivative.extend(self.a.row(index));
        Ok(())
    }
}

impl TestProblem for LinearProblem {
    fn initials(&self) -> Vec<DVector<Self::Field>> {
        let n = self.input_size();
        vec![DVector::zeros(n), DVector::from_element(n, 10.0)]
    }

    fn optima(&self) -> Vec<DVector<Self::Field>> {
        self.solution().into_iter().collect()
    }

    fn is_optimum(&self, p: &DVector<Self::Field>, eps: Self::Field) -> bool {
        // The gradient A^T (b - A p) vanishes in the optimum.
        let mut residual = self.a.mul_vector(p);
        residual.neg_mut();
        residual += &self.b;

        let mut grad = DVector::zeros(self.input_size());
        self.a.tr_mul_to(&residual, &mut grad);
        grad.amax() <= eps
    }
}

/// Part of the problem that fails in [`Faulty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Evaluation always fails.
    Evaluate,
    /// Differentiation always fails.
    Differentiate,
}

/// Wrapper that makes a problem fail in evaluation or differentiation.
#[derive(Debug, Clone)]
pub struct Faulty<P> {
    inner: P,
    fault: Fault,
}

impl<P: SparseProblem> Faulty<P> {
    /// Wraps the problem.
    pub fn new(inner: P, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

impl<P: SparseProblem> SparseProblem for Faulty<P> {
    type Field = P::Field;

    fn input_size(&self) -> usize {
        self.inner.input_size()
    }

    fn output_size(&self) -> usize {
        self.inner.output_size()
    }

    fn constraint(&self) -> DVector<Self::Field> {
        self.inner.constraint()
    }

    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        match self.fault {
            Fault::Evaluate => Err(ProblemError::Custom("evaluation failed".into())),
            Fault::Differentiate => self.inner.evaluate(p, fx),
        }
    }

    fn differentiate(
        &self,
        index: usize,
        p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError> {
        match self.fault {
            Fault::Evaluate => self.inner.differentiate(index, p, derivative),
            Fault::Differentiate => Err(ProblemError::Custom("differentiation failed".into())),
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Generates a random symmetric positive-definite matrix of order `n`.
///
/// Every row gets up to `per_row` random off-diagonal entries (mirrored to
/// keep the symmetry) and a diagonal that makes the matrix strictly
/// diagonally dominant.
pub fn random_spd(n: usize, per_row: usize, seed: u64) -> SparseMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let offdiag = Uniform::new_inclusive(-1.0, 1.0);
    let mut builder = SparseMatrixBuilder::new(n, n);

    for i in 0..n {
        for _ in 0..per_row {
            let j = rng.gen_range(0..n);
            if j != i {
                let value = offdiag.sample(&mut rng);
                builder.add(i, j, value);
                builder.add(j, i, value);
            }
        }
    }

    with_dominant_diagonal(builder.build(), &mut rng)
}

/// Generates a random non-symmetric matrix of order `n` that is strictly
/// diagonally dominant, thus nonsingular.
pub fn random_diagonally_dominant(n: usize, per_row: usize, seed: u64) -> SparseMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let offdiag = Uniform::new_inclusive(-1.0, 1.0);
    let mut builder = SparseMatrixBuilder::new(n, n);

    for i in 0..n {
        for _ in 0..per_row {
            let j = rng.gen_range(0..n);
            if j != i {
                builder.add(i, j, offdiag.sample(&mut rng));
            }
        }
    }

    with_dominant_diagonal(builder.build(), &mut rng)
}

/// Generates a vector of length `n` with standard normal entries.
pub fn random_vector(n: usize, seed: u64) -> DVector<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    DVector::from_iterator(n, (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)))
}

fn with_dominant_diagonal(offdiag: SparseMatrix<f64>, rng: &mut StdRng) -> SparseMatrix<f64> {
    let n = offdiag.nrows();
    let margin = Uniform::new(1.0, 2.0);

    let mut triplets = Vec::with_capacity(offdiag.nnz() + n);
    for i in 0..n {
        let mut row_sum = 0.0;
        for (j, value) in offdiag.row(i) {
            triplets.push((i, j, value));
            row_sum += f64::abs(value);
        }
        triplets.push((i, i, row_sum + margin.sample(rng)));
    }

    SparseMatrix::from_triplets(n, n, triplets)
}
