/// Scalar type the solvers work with. Implemented for `f32` and `f64`.
///
/// On top of [`nalgebra::RealField`] it carries the machine precision
/// constants that are used for detecting numerical breakdowns and it requires
/// `Send + Sync` so that the values can be shared across worker threads.
pub trait RealField: nalgebra::RealField + Copy + Send + Sync {
    /// Machine epsilon.
    const EPSILON: Self;

    /// Square root of machine epsilon. This value is a standard constant for
    /// relative thresholds in first-order methods.
    const EPSILON_SQRT: Self;
}

impl RealField for f32 {
    const EPSILON: Self = f32::EPSILON;
    const EPSILON_SQRT: Self = 0.00034526698;
}

impl RealField for f64 {
    const EPSILON: Self = f64::EPSILON;
    const EPSILON_SQRT: Self = 0.000000014901161193847656;
}
