//! A small statistics module converting between the coupled representations of an
//! uncertainty and combining them.
//!
//! Relative errors (ERR) are fractions at 95% confidence; multiply by 100 for percent.

use crate::core::units::Z_FACTOR_95;

/// Standard deviation of a value known to within the relative error `err`.
pub fn calc_std(value: f64, err: f64) -> f64 {
    value * err / Z_FACTOR_95
}

pub fn calc_var(std: f64) -> f64 {
    std.powi(2)
}

/// Relative error of a value from its standard deviation.
pub fn err_from_std(std: f64, value: f64) -> f64 {
    std / value * Z_FACTOR_95
}

/// Variance of a sum or difference of independent quantities.
pub fn sum_of_variances(variances: &[f64]) -> f64 {
    variances.iter().fold(0., |total, var| total + var)
}

/// Relative error of a product or quotient of independent quantities (root-sum-of-squares).
pub fn quadrature(relative_errors: &[f64]) -> f64 {
    relative_errors
        .iter()
        .fold(0., |total, err| total + err.powi(2))
        .sqrt()
}
