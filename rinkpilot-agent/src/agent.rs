//! The per-frame entry point.

use crate::config::AgentConfig;
use image::DynamicImage;
use rinkpilot_core::{Action, AimPoint, Error, Result, VehicleTelemetry};
use rinkpilot_drive::ControlPolicy;
use rinkpilot_eye::Planner;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything one frame produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameReport {
    pub aim_point: AimPoint,
    pub action: Action,
    pub elapsed_ms: f64,
}

/// Perception and control for one kart.
///
/// Frames must be fed in order: the control policy carries recovery state
/// from one frame to the next.
pub struct Agent {
    planner: Planner,
    policy: ControlPolicy,
    frame_budget: Duration,
    frames: u64,
    frames_over_budget: u64,
}

impl Agent {
    /// Build an agent, loading planner weights from
    /// `config.perception.model_path`.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        config.validate().map_err(Error::Configuration)?;
        let planner = Planner::load(&config.perception)?;
        Self::with_planner(config, planner)
    }

    /// Build an agent around an already constructed planner.
    pub fn with_planner(config: &AgentConfig, planner: Planner) -> Result<Self> {
        config.validate().map_err(Error::Configuration)?;
        let policy = ControlPolicy::new(config.control.clone())?;

        info!(
            "Agent ready: encoder {:?}, input {}x{}, frame budget {:?}",
            planner.config().channels,
            planner.config().input_width,
            planner.config().input_height,
            config.frame_budget()
        );

        Ok(Self {
            planner,
            policy,
            frame_budget: config.frame_budget(),
            frames: 0,
            frames_over_budget: 0,
        })
    }

    /// One frame: locate the puck in `image`, then decide the action.
    pub fn act(&mut self, image: &DynamicImage, telemetry: &VehicleTelemetry) -> Result<Action> {
        self.step(image, telemetry).map(|report| report.action)
    }

    /// [`act`](Self::act) for a raw `height x width x channels` buffer.
    pub fn act_hwc(
        &mut self,
        data: &[u8],
        height: u32,
        width: u32,
        channels: usize,
        telemetry: &VehicleTelemetry,
    ) -> Result<Action> {
        let started = Instant::now();
        telemetry.validate()?;
        let aim = self.planner.infer_hwc(data, height, width, channels)?;
        Ok(self.finish(started, aim, telemetry).action)
    }

    /// Like [`act`](Self::act), also reporting the aim point and timing.
    pub fn step(&mut self, image: &DynamicImage, telemetry: &VehicleTelemetry) -> Result<FrameReport> {
        let started = Instant::now();
        telemetry.validate()?;
        let aim = self.planner.infer(image)?;
        Ok(self.finish(started, aim, telemetry))
    }

    /// Perception only. Leaves control state untouched.
    pub fn perceive(&self, image: &DynamicImage) -> Result<AimPoint> {
        self.planner.infer(image)
    }

    /// Control only, on an aim point supplied by the caller.
    pub fn control(&mut self, aim_point: AimPoint, telemetry: &VehicleTelemetry) -> Result<Action> {
        telemetry.validate()?;
        Ok(self.policy.control(aim_point, telemetry))
    }

    pub fn policy(&self) -> &ControlPolicy {
        &self.policy
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Frames completed through [`act`](Self::act), [`act_hwc`](Self::act_hwc)
    /// or [`step`](Self::step).
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frames_over_budget(&self) -> u64 {
        self.frames_over_budget
    }

    /// Start a new match: forget recovery state and frame statistics.
    pub fn reset(&mut self) {
        self.policy.reset();
        self.frames = 0;
        self.frames_over_budget = 0;
    }

    fn finish(&mut self, started: Instant, aim: AimPoint, telemetry: &VehicleTelemetry) -> FrameReport {
        let action = self.policy.control(aim, telemetry);
        let elapsed = started.elapsed();

        self.frames += 1;
        if elapsed > self.frame_budget {
            self.frames_over_budget += 1;
            warn!(
                "Frame {} took {:?}, over the {:?} budget ({} over so far)",
                self.frames, elapsed, self.frame_budget, self.frames_over_budget
            );
        } else {
            debug!("Frame {} took {:?}", self.frames, elapsed);
        }

        FrameReport {
            aim_point: aim,
            action,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}
