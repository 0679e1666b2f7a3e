//! Kinematic bicycle model of the vehicle

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use num_dual::DualNum;
use serde::{Deserialize, Serialize};

// Internal
use super::{ReferencePath, NUM_STATES};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of the vehicle including its tracking errors to the reference path.
///
/// Generic over the scalar so the same state carries plain values and dual
/// numbers during differentiation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VehicleState<T = f64> {
    /// Position along the vehicle frame x axis
    pub x: T,

    /// Position along the vehicle frame y axis
    pub y: T,

    /// Heading, anticlockwise from the vehicle frame x axis
    pub psi: T,

    /// Speed
    pub v: T,

    /// Cross track error
    pub cte: T,

    /// Heading error
    pub epsi: T
}

/// A steering and throttle demand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Actuation {
    /// Steering angle, sign given by the active `SteerConvention`.
    ///
    /// Units: radians
    pub steer_rad: f64,

    /// Normalised throttle, negative values brake.
    pub throttle: f64
}

/// The kinematic bicycle model constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BicycleModel {
    /// Distance from the front axle to the centre of gravity
    ///
    /// Units: meters
    pub lf_m: f64,

    /// Sign convention of steering demands
    pub steer_convention: SteerConvention
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which direction a positive steering angle turns the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SteerConvention {
    /// A positive angle turns left (anticlockwise yaw).
    LeftPositive,

    /// A positive angle turns right. This is the convention of the
    /// simulator's actuation protocol.
    RightPositive
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteerConvention {
    /// Factor converting a steering demand into an anticlockwise angle.
    pub fn sign(&self) -> f64 {
        match self {
            SteerConvention::LeftPositive => 1.0,
            SteerConvention::RightPositive => -1.0
        }
    }
}

impl Default for SteerConvention {
    fn default() -> Self {
        SteerConvention::RightPositive
    }
}

impl<T: Copy> VehicleState<T> {
    /// The state as an array in variable block order.
    pub fn to_array(&self) -> [T; NUM_STATES] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    /// Build a state from an array in variable block order.
    pub fn from_array(a: [T; NUM_STATES]) -> Self {
        Self {
            x: a[0],
            y: a[1],
            psi: a[2],
            v: a[3],
            cte: a[4],
            epsi: a[5]
        }
    }
}

impl VehicleState<f64> {
    /// The state of a vehicle at the vehicle frame origin, moving at `v`,
    /// relative to the given reference path.
    ///
    /// The cross track error is `f(0)` and the heading error is
    /// `-atan(f'(0))`.
    pub fn anchor(v: f64, path: &ReferencePath) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            v,
            cte: path.eval(0.0),
            epsi: -path.slope(0.0f64).atan()
        }
    }
}

impl BicycleModel {
    /// Yaw rate produced by steering at speed `v`.
    pub fn yaw_rate<D: DualNum<f64> + Copy>(&self, v: D, steer: D) -> D {
        v * steer * (self.steer_convention.sign() / self.lf_m)
    }

    /// Predict the state one step of `dt` ahead, tracking errors measured
    /// against `path`.
    ///
    /// This is the transition the horizon's dynamics constraints enforce:
    ///
    /// ```text
    /// x'    = x + v cos(psi) dt
    /// y'    = y + v sin(psi) dt
    /// psi'  = psi + yaw_rate dt
    /// v'    = v + a dt
    /// cte'  = f(x) - y + v sin(epsi) dt
    /// epsi' = psi - atan(f'(x)) + yaw_rate dt
    /// ```
    pub fn predict<D: DualNum<f64> + Copy>(
        &self,
        state: &VehicleState<D>,
        steer: D,
        throttle: D,
        path: &ReferencePath,
        dt: f64
    ) -> VehicleState<D> {
        let yaw_rate = self.yaw_rate(state.v, steer);

        VehicleState {
            x: state.x + state.v * state.psi.cos() * dt,
            y: state.y + state.v * state.psi.sin() * dt,
            psi: state.psi + yaw_rate * dt,
            v: state.v + throttle * dt,
            cte: path.eval(state.x) - state.y + state.v * state.epsi.sin() * dt,
            epsi: state.psi - path.slope(state.x).atan() + yaw_rate * dt
        }
    }

    /// Advance the state by `dt` holding the actuation constant, carrying
    /// the tracking errors forward without re-measuring them.
    pub fn advance(
        &self,
        state: &VehicleState,
        act: &Actuation,
        dt: f64
    ) -> VehicleState {
        let yaw_rate = self.yaw_rate(state.v, act.steer_rad);

        VehicleState {
            x: state.x + state.v * state.psi.cos() * dt,
            y: state.y + state.v * state.psi.sin() * dt,
            psi: state.psi + yaw_rate * dt,
            v: state.v + act.throttle * dt,
            cte: state.cte + state.v * state.epsi.sin() * dt,
            epsi: state.epsi + yaw_rate * dt
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::Dual64;

    fn model(steer_convention: SteerConvention) -> BicycleModel {
        BicycleModel {
            lf_m: 2.67,
            steer_convention
        }
    }

    #[test]
    fn test_steer_sign() {
        let left = model(SteerConvention::LeftPositive);
        let right = model(SteerConvention::RightPositive);

        assert!(left.yaw_rate(10.0, 0.1) > 0.0);
        assert!(right.yaw_rate(10.0, 0.1) < 0.0);
        assert_relative_eq!(
            left.yaw_rate(10.0, 0.1), -right.yaw_rate(10.0, 0.1)
        );
    }

    #[test]
    fn test_anchor() {
        let path = ReferencePath::from_coeffs([1.5, 0.2, 0.0, 0.0]);
        let s = VehicleState::anchor(12.0, &path);

        assert_eq!(s.x, 0.0);
        assert_eq!(s.psi, 0.0);
        assert_eq!(s.v, 12.0);
        assert_relative_eq!(s.cte, 1.5);
        assert_relative_eq!(s.epsi, -(0.2f64).atan());
    }

    #[test]
    fn test_predict_straight() {
        let m = model(SteerConvention::RightPositive);
        let path = ReferencePath::from_coeffs([0.0; 4]);
        let s: VehicleState = VehicleState { v: 10.0, ..Default::default() };

        let next = m.predict(&s, 0.0, 1.0, &path, 0.1);
        assert_relative_eq!(next.x, 1.0);
        assert_relative_eq!(next.y, 0.0);
        assert_relative_eq!(next.v, 10.1);
        assert_relative_eq!(next.cte, 0.0);
        assert_relative_eq!(next.epsi, 0.0);
    }

    #[test]
    fn test_predict_dual_matches_plain() {
        let m = model(SteerConvention::RightPositive);
        let path = ReferencePath::from_coeffs([0.3, 0.1, -0.01, 0.001]);
        let s: VehicleState = VehicleState {
            x: 1.0, y: 0.2, psi: 0.05, v: 20.0, cte: 0.1, epsi: -0.02
        };

        let plain = m.predict(&s, 0.05, 0.3, &path, 0.1);

        let sd = VehicleState::from_array(s.to_array().map(Dual64::from));
        let dual = m.predict(&sd, Dual64::from(0.05), Dual64::from(0.3), &path, 0.1);

        for (p, d) in plain.to_array().iter().zip(dual.to_array().iter()) {
            assert_relative_eq!(*p, d.re, epsilon = 1e-12);
        }
    }
}
