//! Per-frame control rules.

use crate::config::ControlConfig;
use crate::curve::curve_bias;
use crate::orientation::orient;
use crate::recovery::{Recovery, RecoveryInput, RecoverySnapshot, Turn};
use rinkpilot_core::{Action, AimPoint, Error, Result, VehicleTelemetry};
use tracing::debug;

/// Turns an aim point and the kart's telemetry into an [`Action`].
///
/// The policy owns the recovery state, so one instance must see the frames
/// of one kart in order.
#[derive(Debug, Clone)]
pub struct ControlPolicy {
    config: ControlConfig,
    recovery: Recovery,
}

impl Default for ControlPolicy {
    fn default() -> Self {
        let config = ControlConfig::default();
        let recovery = Recovery::new(config.recovery);
        Self { config, recovery }
    }
}

impl ControlPolicy {
    pub fn new(config: ControlConfig) -> Result<Self> {
        config.validate().map_err(Error::Configuration)?;
        let recovery = Recovery::new(config.recovery);
        Ok(Self { config, recovery })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn control(&mut self, aim_point: AimPoint, telemetry: &VehicleTelemetry) -> Action {
        let cfg = &self.config;
        let aim = aim_point.clamped(cfg.frame_width, cfg.frame_height);

        let front = telemetry.front.ground();
        let location = telemetry.location.ground();
        let speed = telemetry.ground_speed();
        let fast = speed > cfg.fast_speed;
        let very_fast = speed > cfg.very_fast_speed;
        let slow = speed < cfg.slow_speed;

        let cell = location.cell();
        let stuck_now = self.recovery.stuck_now(cell);

        let with_opposition = cfg.opposition_zone.contains(location.y);
        let orientation = orient(front, location, cfg.goal_line);

        let x = if cfg.centered_band.contains(location.x) {
            aim.x
        } else {
            curve_bias(
                aim.x,
                orientation.facing_forward,
                with_opposition,
                orientation.intercept,
                cfg,
            )
        };

        let center_x = cfg.frame_width / 2.0;
        let steering = if x < center_x - cfg.dead_zone {
            Turn::Left
        } else if x > center_x + cfg.dead_zone {
            Turn::Right
        } else {
            Turn::Straight
        };
        let mut steer = steering.steer();

        let mut acceleration = if very_fast { cfg.very_fast_acceleration } else { 1.0 };
        let drift = x < cfg.edge_margin || x > cfg.frame_width - cfg.edge_margin;
        if drift {
            acceleration = cfg.drift_acceleration;
        } else if x < cfg.approach_margin || x > cfg.frame_width - cfg.approach_margin {
            acceleration = cfg.approach_acceleration;
        }

        let brake = self.recovery.is_active();
        let in_arena_center =
            cfg.arena_center_x.contains(location.x) && cfg.arena_center_y.contains(location.y);

        let input = RecoveryInput {
            stuck_now,
            steering,
            target_behind: aim.y > cfg.frame_height / 2.0,
            fast,
            slow,
            in_arena_center,
        };
        if let Some(forced) = self.recovery.step(&input) {
            acceleration = forced.acceleration;
            steer = forced.steer;
        }
        self.recovery.remember(cell);

        let action = Action::new(acceleration, brake, drift, steer);
        debug!(
            "aim {} x {:.1} speed {:.1} facing {} intercept {:.2} -> {:?}",
            aim, x, speed, orientation.facing_forward, orientation.intercept, action
        );
        action
    }

    pub fn recovery(&self) -> RecoverySnapshot {
        self.recovery.snapshot()
    }

    /// Forget all recovery state, e.g. at the start of a new match.
    pub fn reset(&mut self) {
        self.recovery.reset();
    }
}
