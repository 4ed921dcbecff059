//! Perception network and its persisted parameters

pub mod layers;
pub mod planner;
pub mod weights;

pub use planner::{Planner, INPUT_MEAN, INPUT_STD};
pub use weights::{NamedTensor, PlannerWeights, WEIGHTS_FORMAT_VERSION};
