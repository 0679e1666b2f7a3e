//! Decoding of the solver's variable vector

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{Actuation, ActuatorVar, Solution, StateVar, Waypoints};
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Extracts the control from a solution.
#[derive(Debug, Clone, Copy)]
pub struct ControlExtractor {
    /// Units: radians
    max_steer_rad: f64
}

/// The control decoded from one solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    /// Actuation of the first horizon step
    pub actuation: Actuation,

    /// Steering normalised by the steering limit into [-1, 1]
    pub steer_norm: f64,

    /// Predicted vehicle frame positions at each horizon step
    pub predicted: Waypoints
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControlExtractor {
    pub fn new(max_steer_rad: f64) -> Self {
        Self { max_steer_rad }
    }

    /// Decode the first step's actuation and the predicted trajectory.
    pub fn extract(&self, solution: &Solution) -> Control {
        let l = &solution.layout;
        let vars = &solution.vars;

        let actuation = Actuation {
            steer_rad: vars[l.actuator(ActuatorVar::Steer, 0)],
            throttle: vars[l.actuator(ActuatorVar::Throttle, 0)]
        };

        let predicted = Waypoints {
            x: (0..l.horizon()).map(|t| vars[l.state(StateVar::X, t)]).collect(),
            y: (0..l.horizon()).map(|t| vars[l.state(StateVar::Y, t)]).collect()
        };

        Control {
            steer_norm: lin_map(
                (-self.max_steer_rad, self.max_steer_rad),
                (-1.0, 1.0),
                actuation.steer_rad
            ),
            actuation,
            predicted
        }
    }
}
