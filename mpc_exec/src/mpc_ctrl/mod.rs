//! # Model Predictive Control module
//!
//! Receding horizon trajectory control for a ground vehicle. Each cycle the
//! module:
//!
//!  1. Transforms the reference waypoints into the vehicle frame.
//!  1. Fits a cubic reference path through them.
//!  1. Projects the vehicle state forward by the actuation latency.
//!  1. Poses the horizon as a constrained NLP over the kinematic bicycle
//!     model and solves it with `optimization_engine`.
//!  1. Extracts the first step's actuation and the predicted trajectory.
//!
//! All cost and constraint expressions are written once, generic over
//! `num_dual::DualNum`, and differentiated by forward mode dual seeding.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod extract;
mod frame;
mod latency;
mod layout;
mod model;
mod params;
mod poly;
mod problem;
mod solver;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// Internal
pub use extract::*;
pub use frame::*;
pub use latency::*;
pub use layout::*;
pub use model::*;
pub use params::*;
pub use poly::*;
pub use problem::*;
pub use solver::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of state variables per horizon step.
pub const NUM_STATES: usize = 6;

/// Number of actuator variables per horizon step.
pub const NUM_ACTUATORS: usize = 2;

/// Order of the fitted reference path polynomial.
pub const POLY_ORDER: usize = 3;

/// Bound magnitude used for variables with no physical limit.
pub const UNBOUNDED: f64 = 1.0e19;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl operation.
#[derive(Debug, Error)]
pub enum MpcCtrlError {
    #[error("Need at least {required} waypoints to fit the reference path, found {found}")]
    InsufficientPoints {
        found: usize,
        required: usize
    },

    #[error("The waypoints do not define a unique reference path (rank deficient fit)")]
    DegenerateFit,

    #[error("Waypoint x and y sequences have different lengths ({x} and {y})")]
    WaypointLengthMismatch {
        x: usize,
        y: usize
    },

    #[error("The solver did not succeed: {status:?}")]
    SolveFailed {
        status: SolveStatus,
        solution: Box<Solution>
    },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Could not load the parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Could not initialise archiving: {0}")]
    ArchiveError(ArchiveError)
}
