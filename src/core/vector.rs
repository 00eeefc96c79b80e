//! Dense vector utilities.
//!
//! Dense vectors are plain [`DVector`]s from nalgebra, which already provide
//! the arithmetic operators. This module adds the norms used by the solvers
//! and the dimension-checked variants of the binary operations. The operators
//! of nalgebra panic on mismatched lengths, the `try_*` methods report a
//! [`DimensionError`] instead.

use nalgebra::{convert, DVector};
use thiserror::Error;

use super::base::RealField;

/// Two operands of an operation have incompatible lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionError {
    /// The length that was required.
    pub expected: usize,
    /// The length that was provided.
    pub actual: usize,
}

impl DimensionError {
    /// Returns an error if the two lengths differ.
    pub fn check(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self { expected, actual })
        }
    }
}

/// Extension methods for dense vectors.
pub trait VectorExt<F: RealField>: Sized {
    /// Sum of absolute values.
    fn norm_l1(&self) -> F;

    /// Euclidean norm.
    fn norm_l2(&self) -> F;

    /// Squared Euclidean norm.
    fn norm_l2_squared(&self) -> F;

    /// Maximum absolute value, zero for an empty vector.
    fn norm_inf(&self) -> F;

    /// Returns `true` if no element is NaN or infinite.
    fn is_all_finite(&self) -> bool;

    /// Dot product of two vectors of equal length.
    fn try_dot(&self, other: &Self) -> Result<F, DimensionError>;

    /// Elementwise sum of two vectors of equal length.
    fn try_add(&self, other: &Self) -> Result<Self, DimensionError>;

    /// Elementwise difference of two vectors of equal length.
    fn try_sub(&self, other: &Self) -> Result<Self, DimensionError>;

    /// Computes `self += a * x`.
    fn try_axpy(&mut self, a: F, x: &Self) -> Result<(), DimensionError>;
}

impl<F: RealField> VectorExt<F> for DVector<F> {
    fn norm_l1(&self) -> F {
        self.iter().fold(convert(0.0), |acc, xi| acc + xi.abs())
    }

    fn norm_l2(&self) -> F {
        self.norm_l2_squared().sqrt()
    }

    fn norm_l2_squared(&self) -> F {
        self.iter().fold(convert(0.0), |acc, xi| acc + *xi * *xi)
    }

    fn norm_inf(&self) -> F {
        self.iter().fold(convert(0.0), |acc: F, xi| acc.max(xi.abs()))
    }

    fn is_all_finite(&self) -> bool {
        self.iter().all(|xi| xi.is_finite())
    }

    fn try_dot(&self, other: &Self) -> Result<F, DimensionError> {
        DimensionError::check(self.len(), other.len())?;
        Ok(self.dot(other))
    }

    fn try_add(&self, other: &Self) -> Result<Self, DimensionError> {
        DimensionError::check(self.len(), other.len())?;
        Ok(self + other)
    }

    fn try_sub(&self, other: &Self) -> Result<Self, DimensionError> {
        DimensionError::check(self.len(), other.len())?;
        Ok(self - other)
    }

    fn try_axpy(&mut self, a: F, x: &Self) -> Result<(), DimensionError> {
        DimensionError::check(self.len(), x.len())?;
        self.axpy(a, x, convert(1.0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    #[test]
    fn norms() {
        let x = dvector![3.0, -4.0, 0.0];

        assert_abs_diff_eq!(x.norm_l1(), 7.0);
        assert_abs_diff_eq!(x.norm_l2(), 5.0);
        assert_abs_diff_eq!(x.norm_l2_squared(), 25.0);
        assert_abs_diff_eq!(x.norm_inf(), 4.0);
    }

    #[test]
    fn norms_of_empty() {
        let x = DVector::<f64>::zeros(0);

        assert_eq!(x.norm_l1(), 0.0);
        assert_eq!(x.norm_inf(), 0.0);
    }

    #[test]
    fn checked_operations() {
        let mut x = dvector![1.0, 2.0];
        let y = dvector![3.0, 5.0];

        assert_abs_diff_eq!(x.try_dot(&y).unwrap(), 13.0);
        assert_eq!(x.try_add(&y).unwrap(), dvector![4.0, 7.0]);
        assert_eq!(x.try_sub(&y).unwrap(), dvector![-2.0, -3.0]);

        x.try_axpy(2.0, &y).unwrap();
        assert_eq!(x, dvector![7.0, 12.0]);
    }

    #[test]
    fn mismatched_lengths() {
        let mut x = dvector![1.0, 2.0];
        let y = dvector![1.0, 2.0, 3.0];

        let expected = DimensionError {
            expected: 2,
            actual: 3,
        };

        assert_eq!(x.try_dot(&y), Err(expected));
        assert_eq!(x.try_add(&y), Err(expected));
        assert_eq!(x.try_sub(&y), Err(expected));
        assert_eq!(x.try_axpy(1.0, &y), Err(expected));
        assert_eq!(x, dvector![1.0, 2.0]);
    }

    #[test]
    fn finiteness() {
        assert!(dvector![1.0, -2.0].is_all_finite());
        assert!(!dvector![1.0, f64::NAN].is_all_finite());
        assert!(!dvector![f64::INFINITY].is_all_finite());
    }
}
