//! Transforms between the world frame and the vehicle frame

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry2, Point2, Vector2};

// Internal
use super::MpcCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The vehicle frame, positioned in the world frame by the vehicle's pose.
///
/// In the vehicle frame the vehicle sits at the origin with its heading
/// along the +x axis.
#[derive(Debug, Clone, Copy)]
pub struct VehicleFrame {
    /// Transform taking vehicle frame points into the world frame
    world_from_vehicle: Isometry2<f64>
}

/// A set of points split into separate x and y sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waypoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleFrame {
    /// Create the frame of a vehicle at `(x, y)` in the world with heading
    /// `psi_rad` measured anticlockwise from the world +x axis.
    pub fn new(x: f64, y: f64, psi_rad: f64) -> Self {
        Self {
            world_from_vehicle: Isometry2::new(Vector2::new(x, y), psi_rad)
        }
    }

    /// Express a world frame point in the vehicle frame.
    pub fn to_vehicle(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.world_from_vehicle
            .inverse_transform_point(&Point2::new(x, y));
        (p.x, p.y)
    }

    /// Express a vehicle frame point in the world frame.
    pub fn to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.world_from_vehicle
            .transform_point(&Point2::new(x, y));
        (p.x, p.y)
    }

    /// Transform world frame waypoints into the vehicle frame.
    ///
    /// Translates by the negated vehicle position then rotates by the negated
    /// heading. The x and y sequences must have the same length.
    pub fn waypoints_to_vehicle(
        &self,
        world_x: &[f64],
        world_y: &[f64]
    ) -> Result<Waypoints, MpcCtrlError> {
        if world_x.len() != world_y.len() {
            return Err(MpcCtrlError::WaypointLengthMismatch {
                x: world_x.len(),
                y: world_y.len()
            })
        }

        let (x, y) = world_x
            .iter()
            .zip(world_y.iter())
            .map(|(wx, wy)| self.to_vehicle(*wx, *wy))
            .unzip();

        Ok(Waypoints { x, y })
    }
}

impl Waypoints {
    /// Number of points
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}
