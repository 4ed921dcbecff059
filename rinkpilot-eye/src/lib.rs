//! rinkpilot-eye: puck perception for the rinkpilot agent
//!
//! An encoder-decoder convolutional network turns a camera frame into a
//! single-channel response surface; soft-argmax reduces that surface to one
//! aim point in the frame's pixel coordinates.

pub mod config;
pub mod models;
pub mod processing;
pub mod utils;

pub use config::PerceptionConfig;
pub use models::{Planner, PlannerWeights};
pub use processing::soft_argmax;
