//! Soft-argmax coordinate extraction.
//!
//! Turns a response surface into the expected location under a softmax over
//! its values. Coordinates are normalized to `[-1, 1]` on both axes, with
//! `-1` at the first column/row and `1` at the last.

use ndarray::ArrayView2;
use rinkpilot_core::{AimPoint, Error, Result};
use tracing::debug;

/// Evenly spaced grid over `[-1, 1]`. A single cell sits at the centre.
fn axis_grid(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![0.0];
    }
    let step = 2.0 / (n - 1) as f64;
    (0..n).map(|i| -1.0 + step * i as f64).collect()
}

/// Expected `(x, y)` position under `softmax(surface)`.
///
/// The maximum is subtracted before exponentiating, so arbitrarily large
/// scores cannot overflow. NaN scores carry no weight; a surface without a
/// finite maximum yields the grid centroid.
pub fn soft_argmax(surface: ArrayView2<f32>) -> Result<(f32, f32)> {
    let (rows, cols) = surface.dim();
    if rows == 0 || cols == 0 {
        return Err(Error::InputShape("response surface is empty".to_string()));
    }

    let max = surface.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        debug!("response surface has no finite maximum, using centroid");
        return Ok((0.0, 0.0));
    }

    let xs = axis_grid(cols);
    let ys = axis_grid(rows);
    let (mut total, mut sum_x, mut sum_y) = (0.0f64, 0.0f64, 0.0f64);
    for ((row, col), &score) in surface.indexed_iter() {
        let weight = f64::from(score - max).exp();
        if !weight.is_finite() {
            continue;
        }
        total += weight;
        sum_x += weight * xs[col];
        sum_y += weight * ys[row];
    }

    // total >= 1: the maximum itself contributes exp(0)
    Ok(((sum_x / total) as f32, (sum_y / total) as f32))
}

/// Map normalized coordinates onto a `width x height` frame, so `-1` lands
/// on the first pixel and `1` on the last.
///
/// Weights trained against the `(1 + n) * (dim - 1)` mapping produce aim
/// points at half scale here and need their output convention adjusted
/// when converted.
pub fn to_pixel_coordinates((x, y): (f32, f32), width: u32, height: u32) -> AimPoint {
    let span = |n: u32| n.saturating_sub(1) as f32;
    AimPoint::new((x + 1.0) / 2.0 * span(width), (y + 1.0) / 2.0 * span(height))
}
