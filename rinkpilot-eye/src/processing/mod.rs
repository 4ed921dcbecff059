//! Post-processing of network outputs

pub mod soft_argmax;

pub use soft_argmax::{soft_argmax, to_pixel_coordinates};
