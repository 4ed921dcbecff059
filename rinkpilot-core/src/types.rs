use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 3D point or vector as reported by the host simulation.
///
/// Serialized as a plain `[x, y, z]` array, which is how the host hands
/// kart telemetry over.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Projection onto the ground plane. The simulation's depth axis (`z`)
    /// becomes the planar `y`.
    pub fn ground(&self) -> GroundPoint {
        GroundPoint::new(self.x, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Point on the ground plane: `x` across the rink, `y` along its long axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroundPoint {
    pub x: f32,
    pub y: f32,
}

impl GroundPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Integer cell of this position, truncated toward zero on both axes.
    pub fn cell(&self) -> GridCell {
        GridCell(self.x as i32, self.y as i32)
    }
}

/// Coarse integer ground position used to detect a kart that is not moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell(pub i32, pub i32);

/// Per-frame kart state supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleTelemetry {
    pub front: Vec3,
    pub location: Vec3,
    pub velocity: Vec3,
}

impl VehicleTelemetry {
    pub fn new(front: Vec3, location: Vec3, velocity: Vec3) -> Self {
        Self { front, location, velocity }
    }

    /// Reject telemetry the control rules cannot reason about.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("front", &self.front),
            ("location", &self.location),
            ("velocity", &self.velocity),
        ] {
            if !v.is_finite() {
                return Err(Error::InputShape(format!(
                    "telemetry {} has non-finite components: {:?}",
                    name, v
                )));
            }
        }
        Ok(())
    }

    /// Planar speed, ignoring the vertical component.
    pub fn ground_speed(&self) -> f32 {
        self.velocity.ground().norm()
    }
}

/// Estimated target location in control-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct AimPoint {
    pub x: f32,
    pub y: f32,
}

impl AimPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp into `[0, width] x [0, height]`. NaN coordinates land on 0.
    pub fn clamped(&self, width: f32, height: f32) -> Self {
        let clamp = |v: f32, hi: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, hi) };
        Self::new(clamp(self.x, width), clamp(self.y, height))
    }
}

impl From<[f32; 2]> for AimPoint {
    fn from(v: [f32; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<AimPoint> for [f32; 2] {
    fn from(p: AimPoint) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for AimPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Control output consumed by the host runtime.
///
/// Fields are private so every value goes through [`Action::new`], which
/// keeps acceleration in `[0, 1]` and steer in `[-1, 1]`. `nitro` and
/// `rescue` are part of the host schema but never requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Action {
    acceleration: f32,
    brake: bool,
    drift: bool,
    nitro: bool,
    rescue: bool,
    steer: f32,
}

impl Action {
    pub fn new(acceleration: f32, brake: bool, drift: bool, steer: f32) -> Self {
        let saturate = |v: f32, lo: f32, hi: f32| if v.is_nan() { 0.0 } else { v.clamp(lo, hi) };
        Self {
            acceleration: saturate(acceleration, 0.0, 1.0),
            brake,
            drift,
            nitro: false,
            rescue: false,
            steer: saturate(steer, -1.0, 1.0),
        }
    }

    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    pub fn brake(&self) -> bool {
        self.brake
    }

    pub fn drift(&self) -> bool {
        self.drift
    }

    pub fn nitro(&self) -> bool {
        self.nitro
    }

    pub fn rescue(&self) -> bool {
        self.rescue
    }

    pub fn steer(&self) -> f32 {
        self.steer
    }
}

impl Default for Action {
    /// Full throttle, straight ahead.
    fn default() -> Self {
        Self::new(1.0, false, false, 0.0)
    }
}
