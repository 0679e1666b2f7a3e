//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;
use std::ops::{Add, Mul};

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Evaluate a polynomial at `value` using Horner's scheme.
///
/// Coefficients are in ascending order of power, i.e. `c[0] + c[1]*x +
/// c[2]*x^2 + ...`. The value type only needs ring operations and a
/// conversion from `f64`, so this works for dual numbers as well as floats.
pub fn poly_val_asc<T>(value: T, coeffs: &[f64]) -> T
where
    T: Copy + Add<Output = T> + Mul<Output = T> + From<f64>
{
    coeffs
        .iter()
        .rev()
        .fold(T::from(0.0), |acc, c| acc * value + T::from(*c))
}

/// Evaluate the first derivative of a polynomial with ascending coefficients.
pub fn poly_deriv_asc<T>(value: T, coeffs: &[f64]) -> T
where
    T: Copy + Add<Output = T> + Mul<Output = T> + From<f64>
{
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(T::from(0.0), |acc, (i, c)| acc * value + T::from(i as f64 * c))
}
