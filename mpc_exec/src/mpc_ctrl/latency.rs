//! Actuation latency compensation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{Actuation, BicycleModel, VehicleState};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Projects the measured state forward by the actuation latency, so the
/// optimisation starts from where the vehicle will be when its command takes
/// effect.
#[derive(Debug, Clone, Copy)]
pub struct LatencyProjector {
    model: BicycleModel,

    /// Units: seconds
    latency_s: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LatencyProjector {
    pub fn new(model: BicycleModel, latency_s: f64) -> Self {
        Self {
            model,
            latency_s
        }
    }

    /// Project `state` forward by the latency with the previous cycle's
    /// actuation `prev` still applied.
    ///
    /// A zero latency returns the state unchanged.
    pub fn project(&self, state: &VehicleState, prev: &Actuation) -> VehicleState {
        if self.latency_s == 0.0 {
            return *state
        }

        self.model.advance(state, prev, self.latency_s)
    }
}
