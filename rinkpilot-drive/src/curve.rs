//! Curve bias: nudge the aim point so the kart approaches the puck on a
//! line that ends up pointing at the goal.

use crate::config::ControlConfig;

/// Where the heading intercept falls relative to the rink's long axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterceptBands {
    pub far_left: bool,
    pub far_right: bool,
    pub close_left: bool,
    pub close_right: bool,
}

impl InterceptBands {
    pub fn classify(intercept: f32, config: &ControlConfig) -> Self {
        let far = config.far_band;
        let close = config.close_limit;
        Self {
            far_left: -far.max < intercept && intercept < -far.min,
            far_right: far.min < intercept && intercept < far.max,
            close_left: 0.0 < intercept && intercept <= close,
            close_right: -close <= intercept && intercept < 0.0,
        }
    }
}

/// Shift `x` by the trajectory bias.
///
/// Heading toward the goal from far off the axis, the kart curves in from
/// the side the opposition is not covering. Heading away from the goal
/// close to the axis, it swings wide. The decrement and the increment are
/// evaluated independently; when both hold they cancel.
pub fn curve_bias(
    x: f32,
    towards_goal: bool,
    with_opposition: bool,
    intercept: f32,
    config: &ControlConfig,
) -> f32 {
    let bands = InterceptBands::classify(intercept, config);
    let step = config.trajectory_bias;
    let mut x = x;

    if towards_goal && (bands.far_left || bands.far_right) {
        if (bands.far_left && with_opposition) || (bands.far_right && !with_opposition) {
            x -= step;
        }
        if (bands.far_right && with_opposition) || (bands.far_left && !with_opposition) {
            x += step;
        }
    }

    if !towards_goal && (bands.close_left || bands.close_right) {
        if (bands.close_right && with_opposition) || (bands.close_left && !with_opposition) {
            x -= step;
        }
        if (bands.close_left && with_opposition) || (bands.close_right && !with_opposition) {
            x += step;
        }
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Band;

    fn config() -> ControlConfig {
        ControlConfig::default()
    }

    #[test]
    fn test_classify_band_edges() {
        let c = config();
        assert!(InterceptBands::classify(-25.0, &c).far_left);
        assert!(InterceptBands::classify(25.0, &c).far_right);
        assert!(InterceptBands::classify(10.0, &c).close_left);
        assert!(InterceptBands::classify(-10.0, &c).close_right);
        assert_eq!(InterceptBands::classify(0.0, &c), InterceptBands::default());
        assert_eq!(InterceptBands::classify(40.0, &c), InterceptBands::default());
        assert_eq!(InterceptBands::classify(-40.0, &c), InterceptBands::default());
    }

    #[test]
    fn test_towards_goal_far_bands() {
        let c = config();
        assert_eq!(curve_bias(200.0, true, false, 25.0, &c), 198.0);
        assert_eq!(curve_bias(200.0, true, true, 25.0, &c), 202.0);
        assert_eq!(curve_bias(200.0, true, false, -25.0, &c), 202.0);
        assert_eq!(curve_bias(200.0, true, true, -25.0, &c), 198.0);
    }

    #[test]
    fn test_towards_goal_ignores_close_bands() {
        let c = config();
        assert_eq!(curve_bias(200.0, true, false, 5.0, &c), 200.0);
        assert_eq!(curve_bias(200.0, true, true, -5.0, &c), 200.0);
    }

    #[test]
    fn test_away_from_goal_close_bands() {
        let c = config();
        assert_eq!(curve_bias(200.0, false, false, 5.0, &c), 198.0);
        assert_eq!(curve_bias(200.0, false, true, 5.0, &c), 202.0);
        assert_eq!(curve_bias(200.0, false, false, -5.0, &c), 202.0);
        assert_eq!(curve_bias(200.0, false, true, -5.0, &c), 198.0);
    }

    #[test]
    fn test_away_from_goal_ignores_far_bands() {
        let c = config();
        assert_eq!(curve_bias(200.0, false, true, 25.0, &c), 200.0);
        assert_eq!(curve_bias(200.0, false, false, -25.0, &c), 200.0);
    }

    #[test]
    fn test_overlapping_bands_cancel() {
        // close band widened until it overlaps the far band
        let c = ControlConfig {
            close_limit: 20.0,
            far_band: Band::new(5.0, 40.0),
            ..config()
        };
        let bands = InterceptBands::classify(-7.0, &c);
        assert!(bands.far_left && bands.close_right);
        // far_left alone: one nudge toward +x
        assert_eq!(curve_bias(200.0, true, false, -7.0, &c), 202.0);

        let both_far = ControlConfig {
            far_band: Band::new(-40.0, 40.0),
            ..config()
        };
        let bands = InterceptBands::classify(5.0, &both_far);
        assert!(bands.far_left && bands.far_right);
        assert_eq!(curve_bias(200.0, true, false, 5.0, &both_far), 200.0);
        assert_eq!(curve_bias(200.0, true, true, 5.0, &both_far), 200.0);
    }
}
