//! MPC control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::time::Duration;

// Internal
use super::{MpcCtrlError, SteerConvention};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for MPC control.
///
/// Every field has a default, so a parameter file only needs to list the
/// values it changes.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {

    // ---- HORIZON ----

    /// Number of time steps in the prediction horizon (N).
    pub horizon: usize,

    /// Duration of one prediction step.
    ///
    /// Units: seconds
    pub dt_s: f64,

    // ---- VEHICLE MODEL ----

    /// Distance between the front axle and the centre of gravity, used as
    /// the wheelbase of the kinematic bicycle model.
    ///
    /// Units: meters
    pub lf_m: f64,

    /// Steering sign convention of the actuation protocol.
    pub steer_convention: SteerConvention,

    /// Reference (target) speed, in the telemetry's speed unit.
    pub ref_speed: f64,

    /// Expected delay between computing a command and it taking effect.
    ///
    /// Units: seconds
    pub latency_s: f64,

    // ---- ACTUATOR LIMITS ----

    /// Maximum absolute steering angle.
    ///
    /// Units: radians
    pub max_steer_rad: f64,

    /// Maximum absolute throttle demand. The throttle is normalised, 1.0
    /// being full throttle and -1.0 full brake.
    pub max_throttle: f64,

    // ---- TABLES ----

    /// Cost function weights
    pub weights: CostWeights,

    /// External solver configuration
    pub solver: SolverParams,

    /// Reference path visualisation output
    pub display: DisplayParams
}

/// Weights of each of the terms in the MPC cost function.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CostWeights {
    /// Cross track error
    pub cte: f64,

    /// Heading error
    pub epsi: f64,

    /// Deviation from the reference speed
    pub speed: f64,

    /// Steering use
    pub steer: f64,

    /// Throttle use
    pub throttle: f64,

    /// Change of steering between consecutive steps
    pub steer_rate: f64,

    /// Change of throttle between consecutive steps
    pub throttle_rate: f64
}

/// Configuration passed to the external NLP solver.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SolverParams {
    /// Maximum wall-clock time for a single solve.
    ///
    /// Units: seconds
    pub max_duration_s: f64,

    /// If true solver statistics are logged at info level rather than debug.
    pub verbose: bool,

    /// Use the sparse evaluation of the constraint Jacobian.
    pub sparse_jacobian: bool,

    /// Tolerance on the fixed-point residual of the inner solver.
    pub epsilon_tol: f64,

    /// Tolerance on the equality constraint violation.
    pub delta_tol: f64,

    /// Initial tolerance of the inner solver, tightened towards
    /// `epsilon_tol` on each outer iteration.
    pub initial_inner_tol: f64,

    /// Memory length of the inner solver's L-BFGS direction.
    pub lbfgs_memory: usize,

    /// Maximum number of augmented Lagrangian (outer) iterations.
    pub max_outer_iterations: usize,

    /// Maximum number of inner iterations per outer iteration.
    pub max_inner_iterations: usize,

    /// Initial penalty parameter.
    pub initial_penalty: f64,

    /// Factor the penalty is multiplied by when the constraint violation
    /// does not decrease sufficiently.
    pub penalty_update_factor: f64
}

/// Parameters for the sampled reference path sent out for visualisation.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct DisplayParams {
    /// Longitudinal spacing between reference path samples.
    ///
    /// Units: meters
    pub ref_sample_spacing_m: f64,

    /// Number of reference path samples, starting at the vehicle.
    pub ref_sample_count: usize
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            horizon: 10,
            dt_s: 0.1,
            lf_m: 2.67,
            steer_convention: SteerConvention::RightPositive,
            ref_speed: 70.0,
            latency_s: 0.1,
            max_steer_rad: 0.436332,
            max_throttle: 1.0,
            weights: CostWeights::default(),
            solver: SolverParams::default(),
            display: DisplayParams::default()
        }
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cte: 2000.0,
            epsi: 2000.0,
            speed: 1.0,
            steer: 10.0,
            throttle: 10.0,
            steer_rate: 100.0,
            throttle_rate: 100.0
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_duration_s: 0.5,
            verbose: false,
            sparse_jacobian: true,
            epsilon_tol: 1e-5,
            delta_tol: 1e-6,
            initial_inner_tol: 1e-2,
            lbfgs_memory: 10,
            max_outer_iterations: 50,
            max_inner_iterations: 500,
            initial_penalty: 10.0,
            penalty_update_factor: 5.0
        }
    }
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            ref_sample_spacing_m: 2.0,
            ref_sample_count: 25
        }
    }
}

impl SolverParams {
    /// The maximum solve time as a `Duration`.
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs_f64(self.max_duration_s)
    }
}

impl Params {
    /// Check the parameters describe a problem that can be posed.
    pub fn validate(&self) -> Result<(), MpcCtrlError> {
        let positive = [
            ("dt_s", self.dt_s),
            ("lf_m", self.lf_m),
            ("max_steer_rad", self.max_steer_rad),
            ("max_throttle", self.max_throttle),
            ("solver.max_duration_s", self.solver.max_duration_s),
            ("solver.epsilon_tol", self.solver.epsilon_tol),
            ("solver.delta_tol", self.solver.delta_tol),
            ("solver.initial_inner_tol", self.solver.initial_inner_tol),
            ("solver.initial_penalty", self.solver.initial_penalty),
        ];

        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(MpcCtrlError::InvalidParams(format!(
                    "{} must be finite and positive, found {}", name, value
                )));
            }
        }

        if self.horizon < 2 {
            return Err(MpcCtrlError::InvalidParams(format!(
                "horizon must be at least 2, found {}", self.horizon
            )));
        }

        if !(self.latency_s.is_finite() && self.latency_s >= 0.0) {
            return Err(MpcCtrlError::InvalidParams(format!(
                "latency_s must be finite and non-negative, found {}", self.latency_s
            )));
        }

        if self.solver.penalty_update_factor <= 1.0 {
            return Err(MpcCtrlError::InvalidParams(format!(
                "solver.penalty_update_factor must be greater than 1, found {}",
                self.solver.penalty_update_factor
            )));
        }

        if self.solver.initial_inner_tol < self.solver.epsilon_tol {
            return Err(MpcCtrlError::InvalidParams(format!(
                "solver.initial_inner_tol ({}) must not be below solver.epsilon_tol ({})",
                self.solver.initial_inner_tol, self.solver.epsilon_tol
            )));
        }

        if self.solver.max_outer_iterations == 0 || self.solver.max_inner_iterations == 0 {
            return Err(MpcCtrlError::InvalidParams(
                "solver iteration limits must be at least 1".into()
            ));
        }

        if self.solver.lbfgs_memory == 0 {
            return Err(MpcCtrlError::InvalidParams(
                "solver.lbfgs_memory must be at least 1".into()
            ));
        }

        Ok(())
    }
}
