//! rinkpilot-agent: the hockey kart agent.
//!
//! Each frame the [`Agent`] runs the perception network on the camera image
//! to get an aim point, then hands it together with the kart's telemetry to
//! the control policy.

pub mod agent;
pub mod config;

pub use agent::{Agent, FrameReport};
pub use config::AgentConfig;
