//! Control policy for the hockey kart (rinkpilot-drive)
//!
//! Turns the aim point produced by perception plus the kart's own telemetry
//! into an [`Action`](rinkpilot_core::Action):
//! - steer toward the aim point outside a small dead zone
//! - ease off and drift when the target sits near a frame edge
//! - bias the approach line from the kart's heading relative to the goal
//! - detect a wedged kart and run an escape episode

pub mod config;
pub mod curve;
pub mod orientation;
pub mod policy;
pub mod recovery;

pub use config::{Band, ControlConfig, RecoveryConfig};
pub use curve::{curve_bias, InterceptBands};
pub use orientation::{orient, Orientation};
pub use policy::ControlPolicy;
pub use recovery::{RecoverySnapshot, Turn};
