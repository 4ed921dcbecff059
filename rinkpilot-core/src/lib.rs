//! rinkpilot-core: value types shared by the perception and control stages.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Action, AimPoint, GridCell, GroundPoint, Vec3, VehicleTelemetry};
