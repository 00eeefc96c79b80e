//! Graph Laplacian systems for mesh processing.
//!
//! The [uniform graph Laplacian](https://en.wikipedia.org/wiki/Laplacian_matrix)
//! `L = D - W` of a mesh connectivity is assembled by summing the
//! contributions of every edge, which is exactly the accumulate path of
//! [`SparseMatrixBuilder::add`]. On top of it, this module provides two
//! standard uses:
//!
//! * implicit smoothing, which solves the symmetric positive-definite system
//!   `(I + t L) x = x_0` with [conjugate gradient](crate::algo::cg),
//! * Laplacian matching ([`LaplacianMatching`]), a least-squares problem that
//!   finds vertex values with prescribed Laplacian (differential
//!   coordinates) while keeping a few anchor vertices in place.
//!
//! Multi-dimensional vertex data are processed one coordinate at a time.
//!
//! # References
//!
//! \[1\] [Implicit Fairing of Irregular Meshes using Diffusion and Curvature
//! Flow](https://doi.org/10.1145/311535.311576)
//!
//! \[2\] [Laplacian Surface Editing](https://doi.org/10.1145/1057432.1057456)

use nalgebra::DVector;
use num_traits::{One, Zero};

use crate::{
    algo::{CgOptions, ConjugateGradient},
    core::{
        ProblemError, RealField, SolveError, SolveReport, SparseMatrix, SparseMatrixBuilder,
        SparseProblem,
    },
};

/// Assembles the uniform Laplacian `L = D - W` of a graph with `n` vertices.
///
/// Every edge contributes unit weight. Duplicate edges (in either orientation)
/// are counted once and self-loops are ignored, so every row sums to zero and
/// the diagonal holds the vertex degrees.
///
/// # Panics
///
/// Panics if an edge refers to a vertex outside `0..n`.
pub fn uniform_laplacian<F: RealField>(n: usize, edges: &[(usize, usize)]) -> SparseMatrix<F> {
    let mut unique = edges
        .iter()
        .filter(|(i, j)| i != j)
        .map(|&(i, j)| if i < j { (i, j) } else { (j, i) })
        .collect::<Vec<_>>();
    unique.sort_unstable();
    unique.dedup();

    let mut builder = SparseMatrixBuilder::new(n, n);
    for (i, j) in unique {
        builder.add(i, i, F::one());
        builder.add(j, j, F::one());
        builder.add(i, j, -F::one());
        builder.add(j, i, -F::one());
    }

    builder.build()
}

/// Builds the matrix `I + step * L` of implicit Laplacian smoothing.
pub fn implicit_smoothing_system<F: RealField>(
    laplacian: &SparseMatrix<F>,
    step: F,
) -> Result<SparseMatrix<F>, SolveError> {
    if !laplacian.is_square() {
        return Err(SolveError::NotSquare {
            nrows: laplacian.nrows(),
            ncols: laplacian.ncols(),
        });
    }

    let n = laplacian.nrows();
    let scaled = (0..n).flat_map(move |i| {
        laplacian
            .row(i)
            .map(move |(j, value)| (i, j, step * value))
    });
    let identity = (0..n).map(|i| (i, i, F::one()));

    Ok(SparseMatrix::from_triplets(n, n, identity.chain(scaled)))
}

/// Smooths vertex values by one implicit step, solving
/// `(I + step * L) x = x_0` in place with conjugate gradient.
pub fn implicit_smooth<F: RealField>(
    laplacian: &SparseMatrix<F>,
    values: &mut DVector<F>,
    step: F,
    options: CgOptions<F>,
) -> Result<SolveReport<F>, SolveError> {
    let system = implicit_smoothing_system(laplacian, step)?;
    let rhs = values.clone();

    ConjugateGradient::with_options(options).solve(&system, &rhs, values)
}

/// Least-squares problem of matching a prescribed Laplacian.
///
/// The unknowns are the vertex values `x`. The outputs are the Laplacian
/// `L x` followed by the weighted anchored values `w x_a`, the constraint is
/// the target Laplacian followed by the weighted anchor targets. The problem
/// is linear, so a single Gauss-Newton step solves it.
#[derive(Debug, Clone)]
pub struct LaplacianMatching<F> {
    laplacian: SparseMatrix<F>,
    target: DVector<F>,
    anchors: Vec<(usize, F)>,
    weight: F,
}

impl<F: RealField> LaplacianMatching<F> {
    /// Initializes the problem with the target Laplacian and anchors given as
    /// `(vertex, value)` pairs.
    pub fn new(
        laplacian: SparseMatrix<F>,
        target: DVector<F>,
        anchors: Vec<(usize, F)>,
        weight: F,
    ) -> Result<Self, ProblemError> {
        let n = laplacian.nrows();

        if !laplacian.is_square() || target.len() != n {
            return Err(ProblemError::InvalidDimensionality);
        }

        if let Some(&(col, _)) = anchors.iter().find(|(vertex, _)| *vertex >= n) {
            return Err(ProblemError::ColumnOutOfRange { row: n, col });
        }

        if !weight.is_finite() || weight <= F::zero() {
            return Err(ProblemError::InvalidValue);
        }

        Ok(Self {
            laplacian,
            target,
            anchors,
            weight,
        })
    }

    /// Initializes the problem that preserves the Laplacian of `original`,
    /// i.e., the details of the original values, while the anchors are moved
    /// to their new positions.
    pub fn preserving(
        laplacian: SparseMatrix<F>,
        original: &DVector<F>,
        anchors: Vec<(usize, F)>,
        weight: F,
    ) -> Result<Self, ProblemError> {
        if original.len() != laplacian.ncols() {
            return Err(ProblemError::InvalidDimensionality);
        }

        let target = laplacian.mul_vector(original);
        Self::new(laplacian, target, anchors, weight)
    }

    /// The anchors as `(vertex, value)` pairs.
    pub fn anchors(&self) -> &[(usize, F)] {
        &self.anchors
    }
}

impl<F: RealField> SparseProblem for LaplacianMatching<F> {
    type Field = F;

    fn input_size(&self) -> usize {
        self.laplacian.ncols()
    }

    fn output_size(&self) -> usize {
        self.laplacian.nrows() + self.anchors.len()
    }

    fn constraint(&self) -> DVector<Self::Field> {
        let anchored = self.anchors.iter().map(|(_, value)| self.weight * *value);
        DVector::from_iterator(
            self.output_size(),
            self.target.iter().copied().chain(anchored),
        )
    }

    fn evaluate(
        &self,
        p: &DVector<Self::Field>,
        fx: &mut DVector<Self::Field>,
    ) -> Result<(), ProblemError> {
        let n = self.laplacian.nrows();

        for i in 0..n {
            fx[i] = self
                .laplacian
                .row(i)
                .fold(F::zero(), |acc, (j, value)| acc + value * p[j]);
        }

        for (k, (vertex, _)) in self.anchors.iter().enumerate() {
            fx[n + k] = self.weight * p[*vertex];
        }

        Ok(())
    }

    fn differentiate(
        &self,
        index: usize,
        _p: &DVector<Self::Field>,
        derivative: &mut Vec<(usize, Self::Field)>,
    ) -> Result<(), ProblemError> {
        let n = self.laplacian.nrows();

        if index < n {
            derivative.extend(self.laplacian.row(index));
        } else {
            let (vertex, _) = self.anchors[index - n];
            derivative.push((vertex, self.weight));
        }

        Ok(())
    }
}
