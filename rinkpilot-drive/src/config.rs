//! Tuning constants for the control policy

use serde::{Deserialize, Serialize};

/// Open interval `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f32,
    pub max: f32,
}

impl Band {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        self.min < value && value < self.max
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min >= self.max {
            return Err(format!("{} must be a finite band with min < max", name));
        }
        Ok(())
    }
}

/// Stuck detection and escape counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Added to the counter on every frame the vehicle has not left its cell
    pub stuck_increment: i32,
    /// Removed from the counter on every frame of an episode
    pub episode_decrement: i32,
    /// An episode ends once the counter drops below this
    pub exit_below: i32,
    /// An episode starts once the counter exceeds this
    pub trigger_above: i32,
    /// The escape direction follows steering while the counter is below this
    pub free_below: i32,
    /// Episode length when the vehicle is still moving fast
    pub fast_episode: i32,
    /// Episode length otherwise
    pub slow_episode: i32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stuck_increment: 6,
            episode_decrement: 3,
            exit_below: 3,
            trigger_above: 36,
            free_below: 2,
            fast_episode: 36,
            slow_episode: 18,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.stuck_increment <= 0 || self.episode_decrement <= 0 {
            return Err("recovery increments must be positive".to_string());
        }

        if self.fast_episode <= 0 || self.slow_episode <= 0 {
            return Err("recovery episode lengths must be positive".to_string());
        }

        if self.trigger_above < 0 || self.exit_below < 0 || self.free_below < 0 {
            return Err("recovery thresholds cannot be negative".to_string());
        }

        Ok(())
    }
}

/// Control policy configuration
///
/// Pixel quantities are in control-frame coordinates, world quantities
/// in ground-plane units of the host simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Control frame width in pixels
    pub frame_width: f32,
    /// Control frame height in pixels
    pub frame_height: f32,
    /// Half-width of the no-steer band around the frame center
    pub dead_zone: f32,
    pub fast_speed: f32,
    pub very_fast_speed: f32,
    pub slow_speed: f32,
    /// Ground y band where the puck is likely contested
    pub opposition_zone: Band,
    /// Ground x band around the long axis where no curve bias is applied
    pub centered_band: Band,
    /// Rectangle where a slow vehicle counts as recovered
    pub arena_center_x: Band,
    pub arena_center_y: Band,
    /// Distance from either frame edge that triggers drifting
    pub edge_margin: f32,
    /// Distance from either frame edge that starts easing off
    pub approach_margin: f32,
    pub very_fast_acceleration: f32,
    pub drift_acceleration: f32,
    pub approach_acceleration: f32,
    /// Lateral reference line used by the orientation estimate
    pub goal_line: f32,
    /// Pixel nudge applied by the curve bias
    pub trajectory_bias: f32,
    /// Intercept magnitudes counted as far from the axis
    pub far_band: Band,
    /// Intercept magnitudes up to this count as close to the axis
    pub close_limit: f32,
    pub recovery: RecoveryConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            frame_width: 400.0,
            frame_height: 300.0,
            dead_zone: 2.0,
            fast_speed: 10.0,
            very_fast_speed: 20.0,
            slow_speed: 5.0,
            opposition_zone: Band::new(-60.0, -50.0),
            centered_band: Band::new(-10.0, 10.0),
            arena_center_x: Band::new(-8.0, 1.0),
            arena_center_y: Band::new(-55.0, 55.0),
            edge_margin: 50.0,
            approach_margin: 100.0,
            very_fast_acceleration: 0.2,
            drift_acceleration: 0.3,
            approach_acceleration: 0.6,
            goal_line: 65.0,
            trajectory_bias: 2.0,
            far_band: Band::new(10.0, 40.0),
            close_limit: 10.0,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let finite = [
            self.frame_width,
            self.frame_height,
            self.dead_zone,
            self.fast_speed,
            self.very_fast_speed,
            self.slow_speed,
            self.edge_margin,
            self.approach_margin,
            self.goal_line,
            self.trajectory_bias,
            self.close_limit,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err("control constants must be finite".to_string());
        }

        if self.frame_width <= 0.0 || self.frame_height <= 0.0 {
            return Err("Frame size must be positive".to_string());
        }

        if self.dead_zone < 0.0 || self.dead_zone >= self.frame_width / 2.0 {
            return Err("dead_zone must lie in [0, frame_width / 2)".to_string());
        }

        if !(self.slow_speed <= self.fast_speed && self.fast_speed <= self.very_fast_speed) {
            return Err("speed thresholds must satisfy slow <= fast <= very_fast".to_string());
        }

        if self.edge_margin < 0.0
            || self.edge_margin > self.approach_margin
            || self.approach_margin > self.frame_width / 2.0
        {
            return Err("margins must satisfy 0 <= edge <= approach <= frame_width / 2".to_string());
        }

        for (name, value) in [
            ("very_fast_acceleration", self.very_fast_acceleration),
            ("drift_acceleration", self.drift_acceleration),
            ("approach_acceleration", self.approach_acceleration),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be between 0.0 and 1.0", name));
            }
        }

        self.opposition_zone.validate("opposition_zone")?;
        self.centered_band.validate("centered_band")?;
        self.arena_center_x.validate("arena_center_x")?;
        self.arena_center_y.validate("arena_center_y")?;
        self.far_band.validate("far_band")?;

        if self.close_limit <= 0.0 {
            return Err("close_limit must be positive".to_string());
        }

        self.recovery.validate()
    }
}
