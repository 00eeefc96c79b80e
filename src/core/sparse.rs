//! Sparse matrix assembly and compressed row storage.
//!
//! Sparse systems have a two-phase lifecycle. They are first assembled in a
//! [`SparseMatrixBuilder`], which accepts entries in any order and supports
//! both overwriting ([`set`](SparseMatrixBuilder::set)) and accumulating
//! ([`add`](SparseMatrixBuilder::add)) insertion. Once complete, the builder
//! is frozen into a [`SparseMatrix`] in compressed row storage, which is what
//! the solvers read.
//!
//! ```rust
//! use sparsolve::SparseMatrixBuilder;
//!
//! let mut builder = SparseMatrixBuilder::new(2, 2);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 0, 2.0); // overwrites
//! builder.add(1, 1, 1.0);
//! builder.add(1, 1, 1.0); // accumulates
//!
//! let a = builder.build();
//! assert_eq!(a.get(0, 0), 2.0);
//! assert_eq!(a.get(1, 1), 2.0);
//! assert_eq!(a.get(0, 1), 0.0);
//! ```

use std::ops::Range;

use nalgebra::{convert, DMatrix, DVector};
use rayon::prelude::*;

use super::base::RealField;

/// Number of rows from which the matrix-vector product is split across worker
/// threads.
const PARALLEL_ROWS_THRESHOLD: usize = 1024;

/// Sparse matrix in the assembly phase.
///
/// Every row keeps its entries sorted by column, so both insertion and lookup
/// are a binary search within the row.
#[derive(Debug, Clone)]
pub struct SparseMatrixBuilder<F> {
    nrows: usize,
    ncols: usize,
    rows: Vec<Vec<(usize, F)>>,
}

impl<F: RealField> SparseMatrixBuilder<F> {
    /// Creates an empty (all zeros) matrix of given shape.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: vec![Vec::new(); nrows],
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of explicitly stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Sets the entry, overwriting any previous value.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside of the matrix.
    pub fn set(&mut self, row: usize, col: usize, value: F) {
        *self.entry(row, col) = value;
    }

    /// Adds the value to the entry. Unset entries start at zero.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside of the matrix.
    pub fn add(&mut self, row: usize, col: usize, value: F) {
        *self.entry(row, col) += value;
    }

    /// Returns the value of the entry, zero if it is not stored.
    pub fn get(&self, row: usize, col: usize) -> F {
        self.check_bounds(row, col);

        let entries = &self.rows[row];
        match entries.binary_search_by_key(&col, |(j, _)| *j) {
            Ok(pos) => entries[pos].1,
            Err(_) => convert(0.0),
        }
    }

    /// Freezes the matrix into compressed row storage.
    pub fn build(self) -> SparseMatrix<F> {
        SparseMatrix::from_rows(self.nrows, self.ncols, self.rows)
    }

    fn entry(&mut self, row: usize, col: usize) -> &mut F {
        self.check_bounds(row, col);

        let entries = &mut self.rows[row];
        let pos = match entries.binary_search_by_key(&col, |(j, _)| *j) {
            Ok(pos) => pos,
            Err(pos) => {
                entries.insert(pos, (col, convert(0.0)));
                pos
            }
        };

        &mut entries[pos].1
    }

    fn check_bounds(&self, row: usize, col: usize) {
        assert!(
            row < self.nrows,
            "row index {} out of bounds ({} rows)",
            row,
            self.nrows
        );
        assert!(
            col < self.ncols,
            "column index {} out of bounds ({} columns)",
            col,
            self.ncols
        );
    }
}

/// Sparse matrix in compressed row storage.
///
/// Columns are sorted within each row and every coordinate is stored at most
/// once. Entries that are not stored are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<F> {
    nrows: usize,
    ncols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<F>,
}

impl<F: RealField> SparseMatrix<F> {
    /// Creates a matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            row_offsets: vec![0; nrows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates the identity matrix of given size.
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            row_offsets: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![convert(1.0); n],
        }
    }

    /// Creates a matrix from `(row, col, value)` triplets. Values of repeated
    /// coordinates are summed.
    ///
    /// # Panics
    ///
    /// Panics if a coordinate lies outside of the matrix.
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, F)>,
    {
        let mut builder = SparseMatrixBuilder::new(nrows, ncols);
        for (row, col, value) in triplets {
            builder.add(row, col, value);
        }
        builder.build()
    }

    /// Creates a matrix from rows of `(col, value)` pairs that are sorted by
    /// column and free of duplicates.
    pub(crate) fn from_rows(nrows: usize, ncols: usize, rows: Vec<Vec<(usize, F)>>) -> Self {
        debug_assert_eq!(rows.len(), nrows);

        let nnz: usize = rows.iter().map(Vec::len).sum();
        let mut row_offsets = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_offsets.push(0);
        for row in rows {
            debug_assert!(row.windows(2).all(|w| w[0].0 < w[1].0));

            for (col, value) in row {
                col_indices.push(col);
                values.push(value);
            }
            row_offsets.push(col_indices.len());
        }

        Self {
            nrows,
            ncols,
            row_offsets,
            col_indices,
            values,
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of explicitly stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the matrix is square.
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Returns the value of the entry, zero if it is not stored.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside of the matrix.
    pub fn get(&self, row: usize, col: usize) -> F {
        assert!(row < self.nrows && col < self.ncols, "index out of bounds");

        let range = self.row_range(row);
        match self.col_indices[range.clone()].binary_search(&col) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => convert(0.0),
        }
    }

    /// Iterates over `(col, value)` pairs of given row in increasing column
    /// order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, F)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Stored values in row-major order.
    pub fn values(&self) -> &[F] {
        &self.values
    }

    /// Computes `y = A x`.
    ///
    /// Large matrices are processed in parallel, one output row per task.
    pub fn mul_to(&self, x: &DVector<F>, y: &mut DVector<F>) {
        assert_eq!(x.len(), self.ncols, "x has invalid dimension");
        assert_eq!(y.len(), self.nrows, "y has invalid dimension");

        let row_dot = |i: usize| {
            let range = self.row_range(i);
            self.col_indices[range.clone()]
                .iter()
                .zip(&self.values[range])
                .fold(convert::<f64, F>(0.0), |acc, (j, aij)| acc + *aij * x[*j])
        };

        if self.nrows >= PARALLEL_ROWS_THRESHOLD {
            y.as_mut_slice()
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, yi)| *yi = row_dot(i));
        } else {
            y.iter_mut()
                .enumerate()
                .for_each(|(i, yi)| *yi = row_dot(i));
        }
    }

    /// Computes `A x` into a new vector.
    pub fn mul_vector(&self, x: &DVector<F>) -> DVector<F> {
        let mut y = DVector::zeros(self.nrows);
        self.mul_to(x, &mut y);
        y
    }

    /// Computes `y = A^T x`.
    pub fn tr_mul_to(&self, x: &DVector<F>, y: &mut DVector<F>) {
        assert_eq!(x.len(), self.nrows, "x has invalid dimension");
        assert_eq!(y.len(), self.ncols, "y has invalid dimension");

        y.fill(convert(0.0));
        for i in 0..self.nrows {
            let xi = x[i];
            for (j, aij) in self.row(i) {
                y[j] += aij * xi;
            }
        }
    }

    /// Returns the transposed matrix.
    pub fn transpose(&self) -> Self {
        // Counting sort by column. Rows are visited in increasing order, so
        // the columns of the transposed rows come out sorted.
        let mut row_offsets = vec![0; self.ncols + 1];
        for &j in &self.col_indices {
            row_offsets[j + 1] += 1;
        }
        for j in 0..self.ncols {
            row_offsets[j + 1] += row_offsets[j];
        }

        let mut next = row_offsets.clone();
        let mut col_indices = vec![0; self.nnz()];
        let mut values = vec![convert(0.0); self.nnz()];

        for i in 0..self.nrows {
            for (j, aij) in self.row(i) {
                let dst = next[j];
                col_indices[dst] = i;
                values[dst] = aij;
                next[j] += 1;
            }
        }

        Self {
            nrows: self.ncols,
            ncols: self.nrows,
            row_offsets,
            col_indices,
            values,
        }
    }

    /// Computes the Gram matrix `A^T A`.
    ///
    /// The result always stores the full diagonal (possibly explicit zeros),
    /// so that it can be damped without changing the structure. Rows of the
    /// result are computed in parallel.
    pub fn gram(&self) -> Self {
        let n = self.ncols;
        let at = self.transpose();
        let zero = convert::<f64, F>(0.0);

        let rows = (0..n)
            .into_par_iter()
            .map_init(
                || (vec![zero; n], vec![false; n], Vec::<usize>::new()),
                |(acc, marked, touched), i| {
                    marked[i] = true;
                    touched.push(i);

                    for (r, ari) in at.row(i) {
                        for (j, arj) in self.row(r) {
                            if !marked[j] {
                                marked[j] = true;
                                touched.push(j);
                            }
                            acc[j] += ari * arj;
                        }
                    }

                    touched.sort_unstable();
                    let row = touched.iter().map(|&j| (j, acc[j])).collect::<Vec<_>>();

                    for &j in touched.iter() {
                        acc[j] = zero;
                        marked[j] = false;
                    }
                    touched.clear();

                    row
                },
            )
            .collect::<Vec<_>>();

        Self::from_rows(n, n, rows)
    }

    /// Extracts the main diagonal.
    pub fn diagonal(&self) -> DVector<F> {
        let n = self.nrows.min(self.ncols);
        DVector::from_iterator(n, (0..n).map(|i| self.get(i, i)))
    }

    /// Converts to a dense matrix.
    pub fn to_dense(&self) -> DMatrix<F> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            for (j, aij) in self.row(i) {
                dense[(i, j)] = aij;
            }
        }
        dense
    }

    fn row_range(&self, row: usize) -> Range<usize> {
        self.row_offsets[row]..self.row_offsets[row + 1]
    }
}
