//! Reference path fitting

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{DMatrix, DVector};
use num_dual::DualNum;
use serde::Serialize;

// Internal
use super::{MpcCtrlError, Waypoints, POLY_ORDER};
use util::maths::{poly_deriv_asc, poly_val_asc};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of coefficients in the reference path polynomial.
pub const NUM_COEFFS: usize = POLY_ORDER + 1;

/// Diagonal entries of the QR factor smaller than this fraction of the largest
/// one mark the fit as rank deficient.
const RANK_REL_TOL: f64 = 1e-12;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The reference path `y = f(x)` in the vehicle frame, a cubic polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferencePath {
    /// Coefficients in ascending order of power
    coeffs: [f64; NUM_COEFFS]
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReferencePath {
    /// Create a path directly from coefficients in ascending order.
    pub fn from_coeffs(coeffs: [f64; NUM_COEFFS]) -> Self {
        Self { coeffs }
    }

    /// Least squares fit of a cubic through vehicle frame waypoints.
    ///
    /// The Vandermonde system is solved through its Householder QR
    /// decomposition.
    pub fn fit(waypoints: &Waypoints) -> Result<Self, MpcCtrlError> {
        if waypoints.x.len() != waypoints.y.len() {
            return Err(MpcCtrlError::WaypointLengthMismatch {
                x: waypoints.x.len(),
                y: waypoints.y.len()
            })
        }

        let n = waypoints.len();
        if n < NUM_COEFFS {
            return Err(MpcCtrlError::InsufficientPoints {
                found: n,
                required: NUM_COEFFS
            })
        }

        let a = DMatrix::from_fn(n, NUM_COEFFS, |i, j| {
            waypoints.x[i].powi(j as i32)
        });
        let y = DVector::from_column_slice(&waypoints.y);

        let qr = a.qr();
        let r = qr.r();

        // Check the rank from the diagonal of R
        let diag = r.diagonal();
        let max_diag = diag.iter().fold(0.0f64, |m, d| m.max(d.abs()));
        if !max_diag.is_finite()
            || max_diag == 0.0
            || diag.iter().any(|d| d.abs() <= RANK_REL_TOL * max_diag)
        {
            return Err(MpcCtrlError::DegenerateFit)
        }

        let qty = qr.q().transpose() * y;
        let sol = r.solve_upper_triangular(&qty)
            .ok_or(MpcCtrlError::DegenerateFit)?;

        let mut coeffs = [0f64; NUM_COEFFS];
        for (c, s) in coeffs.iter_mut().zip(sol.iter()) {
            *c = *s;
        }

        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(MpcCtrlError::DegenerateFit)
        }

        trace!("Reference path coefficients: {:?}", coeffs);

        Ok(Self { coeffs })
    }

    /// Coefficients in ascending order of power.
    pub fn coeffs(&self) -> &[f64; NUM_COEFFS] {
        &self.coeffs
    }

    /// Evaluate `f(x)`.
    pub fn eval<D: DualNum<f64> + Copy>(&self, x: D) -> D {
        poly_val_asc(x, &self.coeffs)
    }

    /// Evaluate `f'(x)`.
    pub fn slope<D: DualNum<f64> + Copy>(&self, x: D) -> D {
        poly_deriv_asc(x, &self.coeffs)
    }

    /// Sample the path at `count` points spaced `spacing` apart along x,
    /// starting at the vehicle.
    pub fn sample(&self, spacing: f64, count: usize) -> Waypoints {
        let x: Vec<f64> = (0..count).map(|i| i as f64 * spacing).collect();
        let y = x.iter().map(|xi| self.eval(*xi)).collect();

        Waypoints { x, y }
    }
}
