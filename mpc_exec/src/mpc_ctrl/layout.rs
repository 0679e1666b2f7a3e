//! Layout of the optimisation variable vector
//!
//! The vector holds six state blocks of length N (x, y, psi, v, cte, epsi)
//! followed by two actuator blocks of length N - 1 (steering, throttle).
//! Equality constraint rows follow the state blocks, so the row for state
//! `s` at step `t` has the same index as the variable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{VehicleState, NUM_ACTUATORS, NUM_STATES};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Index arithmetic over the variable vector for a horizon of `N` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLayout {
    horizon: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State variable blocks, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateVar {
    X,
    Y,
    Psi,
    V,
    Cte,
    Epsi
}

/// Actuator variable blocks, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorVar {
    Steer,
    Throttle
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StateVar {
    pub const ALL: [StateVar; NUM_STATES] = [
        StateVar::X,
        StateVar::Y,
        StateVar::Psi,
        StateVar::V,
        StateVar::Cte,
        StateVar::Epsi
    ];
}

impl ActuatorVar {
    pub const ALL: [ActuatorVar; NUM_ACTUATORS] = [
        ActuatorVar::Steer,
        ActuatorVar::Throttle
    ];
}

impl VarLayout {
    pub fn new(horizon: usize) -> Self {
        Self { horizon }
    }

    /// Number of steps in the horizon (N).
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Number of actuation steps (N - 1).
    pub fn num_actuations(&self) -> usize {
        self.horizon.saturating_sub(1)
    }

    /// Total number of optimisation variables, `6N + 2(N - 1)`.
    pub fn num_vars(&self) -> usize {
        NUM_STATES * self.horizon + NUM_ACTUATORS * self.num_actuations()
    }

    /// Total number of equality constraints, `6N`.
    pub fn num_constraints(&self) -> usize {
        NUM_STATES * self.horizon
    }

    /// Index of the first variable of a state block.
    pub fn state_start(&self, var: StateVar) -> usize {
        var as usize * self.horizon
    }

    /// Index of the first variable of an actuator block.
    pub fn actuator_start(&self, var: ActuatorVar) -> usize {
        NUM_STATES * self.horizon + var as usize * self.num_actuations()
    }

    /// Index of state `var` at step `t`.
    pub fn state(&self, var: StateVar, t: usize) -> usize {
        self.state_start(var) + t
    }

    /// Index of actuator `var` at step `t`.
    pub fn actuator(&self, var: ActuatorVar, t: usize) -> usize {
        self.actuator_start(var) + t
    }

    /// Constraint row of state `var` at step `t`.
    pub fn constraint_row(&self, var: StateVar, t: usize) -> usize {
        self.state(var, t)
    }

    /// Gather the state at step `t` from a variable vector.
    pub fn state_at<T: Copy>(&self, vars: &[T], t: usize) -> VehicleState<T> {
        let mut a = [vars[0]; NUM_STATES];
        for (i, var) in StateVar::ALL.iter().enumerate() {
            a[i] = vars[self.state(*var, t)];
        }
        VehicleState::from_array(a)
    }

    /// Scatter a state into step `t` of a variable vector.
    pub fn set_state<T: Copy>(&self, vars: &mut [T], t: usize, state: &VehicleState<T>) {
        for (var, value) in StateVar::ALL.iter().zip(state.to_array().iter()) {
            vars[self.state(*var, t)] = *value;
        }
    }

    /// Indices of the variables a dynamics step from `t - 1` to `t` depends
    /// on: the states at `t - 1`, the actuators at `t - 1` and the states at
    /// `t`.
    pub fn step_vars(&self, t: usize) -> [usize; 2 * NUM_STATES + NUM_ACTUATORS] {
        let mut idx = [0; 2 * NUM_STATES + NUM_ACTUATORS];

        for (i, var) in StateVar::ALL.iter().enumerate() {
            idx[i] = self.state(*var, t - 1);
            idx[NUM_STATES + NUM_ACTUATORS + i] = self.state(*var, t);
        }
        for (i, var) in ActuatorVar::ALL.iter().enumerate() {
            idx[NUM_STATES + i] = self.actuator(*var, t - 1);
        }

        idx
    }
}
