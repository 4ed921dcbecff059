//! Heading estimate from the kart's front and center points.

use rinkpilot_core::GroundPoint;

/// Added to the run of the heading line so a vertical heading never
/// divides by exactly zero.
pub const SLOPE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// The front point lies further down the rink than the center.
    pub facing_forward: bool,
    /// Signed lateral offset where the heading meets the goal line.
    pub intercept: f32,
}

/// Project the heading line through `front` and `location` onto the
/// lateral line `y = goal_line`.
///
/// A zero or non-finite slope has no crossing; the location's depth
/// coordinate is used instead. The crossing is negated when the kart faces
/// away from the goal. The result is always finite for finite inputs.
pub fn orient(front: GroundPoint, location: GroundPoint, goal_line: f32) -> Orientation {
    let facing_forward = front.y > location.y;

    let slope = (location.y - front.y) / (location.x - front.x + SLOPE_EPSILON);
    let intersect = location.y - slope * location.x;

    let intercept = if slope != 0.0 && slope.is_finite() && intersect.is_finite() {
        let sign = if facing_forward { 1.0 } else { -1.0 };
        sign * (goal_line - intersect) / slope
    } else {
        location.y
    };

    Orientation {
        facing_forward,
        intercept: if intercept.is_finite() { intercept } else { location.y },
    }
}
