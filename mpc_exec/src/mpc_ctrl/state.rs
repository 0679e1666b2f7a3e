//! MpcCtrl module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

// Internal
use super::*;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// MPC control module state
#[derive(Default)]
pub struct MpcCtrl {
    params: Params,

    /// Reference path of the most recent cycle
    path: Option<ReferencePath>,

    report: StatusReport,
    arch_report: Archiver,

    /// Latency projected state the most recent horizon started from
    projected: VehicleState,
    arch_projected: Archiver
}

/// Telemetry input to MpcCtrl.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputData {
    /// World frame x positions of the reference waypoints
    #[serde(rename = "ptsx")]
    pub waypoints_x: Vec<f64>,

    /// World frame y positions of the reference waypoints
    #[serde(rename = "ptsy")]
    pub waypoints_y: Vec<f64>,

    /// World frame vehicle position
    pub x: f64,
    pub y: f64,

    /// Vehicle heading, anticlockwise from the world x axis
    ///
    /// Units: radians
    pub psi: f64,

    /// Vehicle speed
    pub speed: f64,

    /// Steering angle currently applied
    ///
    /// Units: radians
    #[serde(rename = "steering_angle")]
    pub steer_rad: f64,

    /// Throttle currently applied
    pub throttle: f64
}

/// Command output from MpcCtrl.
///
/// All positions are in the vehicle frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputData {
    /// Steering demand normalised into [-1, 1]
    #[serde(rename = "steering_angle")]
    pub steer_norm: f64,

    /// Throttle demand in [-1, 1]
    pub throttle: f64,

    /// Predicted trajectory
    #[serde(rename = "mpc_x")]
    pub predicted_x: Vec<f64>,
    #[serde(rename = "mpc_y")]
    pub predicted_y: Vec<f64>,

    /// Samples of the reference path
    #[serde(rename = "next_x")]
    pub reference_x: Vec<f64>,
    #[serde(rename = "next_y")]
    pub reference_y: Vec<f64>
}

/// Status report for MpcCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Session time at the start of the cycle
    ///
    /// Units: seconds
    pub time_s: f64,

    pub num_waypoints: usize,

    /// Tracking errors of the projected state
    pub cte: f64,
    pub epsi: f64,

    /// Solver termination status, `None` if no solve was attempted
    pub solve_status: Option<SolveStatus>,

    pub cost: f64,
    pub max_violation: f64,
    pub outer_iterations: usize,
    pub inner_iterations: usize,

    /// Units: seconds
    pub solve_time_s: f64,

    /// Decoded first step actuation
    pub steer_rad: f64,
    pub throttle: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MpcCtrl {
    type InitData = &'static str;
    type InitError = MpcCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = MpcCtrlError;

    /// Initialise the MpcCtrl module.
    ///
    /// Expected init data is the path to the parameter file, relative to the
    /// params directory.
    fn init(
        &mut self,
        init_data: Self::InitData,
        session: &Session
    ) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data)
            .map_err(MpcCtrlError::ParamLoadError)?;

        *self = Self::from_params(params)?;

        self.arch_report = Archiver::from_path(
            session, "mpc_ctrl/status_report.csv"
        ).map_err(MpcCtrlError::ArchiveError)?;
        self.arch_projected = Archiver::from_path(
            session, "mpc_ctrl/projected_state.csv"
        ).map_err(MpcCtrlError::ArchiveError)?;

        Ok(())
    }

    /// Perform one control cycle.
    ///
    /// A solve that does not succeed is returned as `SolveFailed` carrying
    /// the best solution found, which `output_from_solution` can still turn
    /// into a command.
    fn proc(
        &mut self,
        input_data: &Self::InputData
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {

        // Setup cycle data
        self.report = StatusReport {
            time_s: session::get_elapsed_seconds(),
            num_waypoints: input_data.waypoints_x.len(),
            ..Default::default()
        };
        self.path = None;

        // ---- REFERENCE PATH ----

        let frame = VehicleFrame::new(input_data.x, input_data.y, input_data.psi);
        let waypoints = frame.waypoints_to_vehicle(
            &input_data.waypoints_x,
            &input_data.waypoints_y
        )?;

        let path = ReferencePath::fit(&waypoints)?;
        self.path = Some(path);

        // ---- INITIAL STATE ----

        let anchor = VehicleState::anchor(input_data.speed, &path);
        let prev = Actuation {
            steer_rad: input_data.steer_rad,
            throttle: input_data.throttle
        };
        self.projected = self.projector().project(&anchor, &prev);

        self.report.cte = self.projected.cte;
        self.report.epsi = self.projected.epsi;

        trace!("MpcCtrl anchor state: {:?}", anchor);
        trace!("MpcCtrl projected state: {:?}", self.projected);

        // ---- SOLVE ----

        let nlp = ProblemBuilder::new(&self.params).build(&self.projected, &path);
        let solution = SolverAdapter::new(self.params.solver.clone()).solve(&nlp);

        self.report.solve_status = Some(solution.status);
        self.report.cost = solution.cost;
        self.report.max_violation = solution.max_violation;
        self.report.outer_iterations = solution.outer_iterations;
        self.report.inner_iterations = solution.inner_iterations;
        self.report.solve_time_s = solution.solve_time.as_secs_f64();

        let control = self.extractor().extract(&solution);
        self.report.steer_rad = control.actuation.steer_rad;
        self.report.throttle = control.actuation.throttle;

        if solution.status != SolveStatus::Success {
            warn!(
                "MpcCtrl solve did not succeed ({:?}), max constraint violation {:.3e}",
                solution.status, solution.max_violation
            );
            return Err(MpcCtrlError::SolveFailed {
                status: solution.status,
                solution: Box::new(solution)
            })
        }

        let output = self.build_output(&control, &path);

        debug!(
            "MpcCtrl output: steer {:.4} rad ({:.3}), throttle {:.3}",
            control.actuation.steer_rad, output.steer_norm, output.throttle
        );

        Ok((output, self.report))
    }
}

impl Archived for MpcCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if self.arch_report.is_init() {
            self.arch_report.serialise(self.report)?;
        }
        if self.arch_projected.is_init() {
            self.arch_projected.serialise(self.projected)?;
        }

        Ok(())
    }
}

impl MpcCtrl {
    /// Create the module directly from parameters, without archiving.
    pub fn from_params(params: Params) -> Result<Self, MpcCtrlError> {
        params.validate()?;

        Ok(Self {
            params,
            ..Default::default()
        })
    }

    /// Turn a solution of the current cycle into a command, used to act on
    /// the best iterate of a solve that did not succeed.
    ///
    /// Returns `None` if the iterate is not usable, either because the solver
    /// reported a numerical failure or because the decoded actuation is not
    /// finite.
    pub fn output_from_solution(&self, solution: &Solution) -> Option<OutputData> {
        if solution.status == SolveStatus::NumericalFailure {
            warn!("MpcCtrl solution is a numerical failure, no command decoded");
            return None
        }

        let control = self.extractor().extract(solution);

        if !control.steer_norm.is_finite() || !control.actuation.throttle.is_finite() {
            warn!("MpcCtrl solution has a non-finite actuation, no command decoded");
            return None
        }

        Some(match self.path {
            Some(ref path) => self.build_output(&control, path),
            None => OutputData {
                steer_norm: control.steer_norm,
                throttle: control.actuation.throttle,
                predicted_x: control.predicted.x,
                predicted_y: control.predicted.y,
                ..Default::default()
            }
        })
    }

    fn projector(&self) -> LatencyProjector {
        LatencyProjector::new(
            BicycleModel {
                lf_m: self.params.lf_m,
                steer_convention: self.params.steer_convention
            },
            self.params.latency_s
        )
    }

    fn extractor(&self) -> ControlExtractor {
        ControlExtractor::new(self.params.max_steer_rad)
    }

    fn build_output(&self, control: &Control, path: &ReferencePath) -> OutputData {
        let reference = path.sample(
            self.params.display.ref_sample_spacing_m,
            self.params.display.ref_sample_count
        );

        OutputData {
            steer_norm: control.steer_norm,
            throttle: control.actuation.throttle,
            predicted_x: control.predicted.x.clone(),
            predicted_y: control.predicted.y.clone(),
            reference_x: reference.x,
            reference_y: reference.y
        }
    }
}

impl OutputData {
    /// A command bringing the vehicle to a stop: straight wheels, full brake.
    pub fn stop() -> Self {
        Self {
            steer_norm: 0.0,
            throttle: -1.0,
            ..Default::default()
        }
    }
}
