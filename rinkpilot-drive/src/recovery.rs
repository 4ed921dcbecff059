//! Stuck detection and escape episodes.
//!
//! A kart that stays in the same integer cell accumulates a counter. Once
//! the counter crosses the trigger (or the target is behind the kart) an
//! episode starts: throttle is cut and the wheel is held at a fixed escape
//! direction while the counter drains. The counter rises by
//! `stuck_increment` per stationary frame and drains by `episode_decrement`
//! per episode frame, so brief contacts never start an episode and a
//! started episode runs its course.

use crate::config::RecoveryConfig;
use rinkpilot_core::GridCell;
use serde::Serialize;
use tracing::{debug, warn};

/// Steering direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i8")]
pub enum Turn {
    Left,
    Straight,
    Right,
}

impl Turn {
    pub fn steer(self) -> f32 {
        match self {
            Turn::Left => -1.0,
            Turn::Straight => 0.0,
            Turn::Right => 1.0,
        }
    }
}

impl From<Turn> for i8 {
    fn from(turn: Turn) -> Self {
        match turn {
            Turn::Left => -1,
            Turn::Straight => 0,
            Turn::Right => 1,
        }
    }
}

/// What the policy observed this frame, as far as recovery cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryInput {
    pub stuck_now: bool,
    pub steering: Turn,
    pub target_behind: bool,
    pub fast: bool,
    pub slow: bool,
    pub in_arena_center: bool,
}

/// Throttle and steer imposed during an episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryOverride {
    pub acceleration: f32,
    pub steer: f32,
}

/// Read-only view of the recovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoverySnapshot {
    pub stuck: bool,
    pub episode_counter: i32,
    pub forced_turn: Turn,
    pub previous_cell: Option<GridCell>,
}

#[derive(Debug, Clone)]
pub struct Recovery {
    config: RecoveryConfig,
    stuck: bool,
    episode_counter: i32,
    forced_turn: Turn,
    previous_cell: Option<GridCell>,
}

impl Recovery {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            stuck: false,
            episode_counter: 0,
            forced_turn: Turn::Left,
            previous_cell: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stuck
    }

    /// The kart has not left `cell` since the previous frame. Never true
    /// before a first frame has been remembered.
    pub fn stuck_now(&self, cell: GridCell) -> bool {
        self.previous_cell == Some(cell)
    }

    /// Advance one frame. Returns the override to apply when an episode
    /// was already running at the start of the frame.
    pub fn step(&mut self, input: &RecoveryInput) -> Option<RecoveryOverride> {
        let cfg = self.config;

        if self.stuck {
            let forced = RecoveryOverride {
                acceleration: 0.0,
                steer: self.forced_turn.steer(),
            };
            self.episode_counter -= cfg.episode_decrement;
            if (input.slow && input.in_arena_center) || self.episode_counter < cfg.exit_below {
                debug!("Recovery episode finished (counter {})", self.episode_counter);
                self.episode_counter = 0;
                self.stuck = false;
            }
            return Some(forced);
        }

        if input.stuck_now {
            self.episode_counter = self.episode_counter.saturating_add(cfg.stuck_increment);
        } else {
            self.episode_counter = 0;
        }

        if self.episode_counter < cfg.free_below {
            self.forced_turn = match input.steering {
                Turn::Left => Turn::Right,
                _ => Turn::Left,
            };
        }

        let wedged = self.episode_counter > cfg.trigger_above;
        if wedged || input.target_behind {
            if input.fast {
                self.episode_counter = cfg.fast_episode;
                self.forced_turn = Turn::Straight;
            } else {
                self.episode_counter = cfg.slow_episode;
            }
            self.stuck = true;

            if wedged {
                warn!(
                    "Kart stuck, starting recovery: {} frames turning {:?}",
                    self.episode_counter, self.forced_turn
                );
            } else {
                debug!("Target behind, starting recovery turning {:?}", self.forced_turn);
            }
        }

        None
    }

    pub fn remember(&mut self, cell: GridCell) {
        self.previous_cell = Some(cell);
    }

    pub fn snapshot(&self) -> RecoverySnapshot {
        RecoverySnapshot {
            stuck: self.stuck,
            episode_counter: self.episode_counter,
            forced_turn: self.forced_turn,
            previous_cell: self.previous_cell,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> RecoveryInput {
        RecoveryInput {
            stuck_now: false,
            steering: Turn::Straight,
            target_behind: false,
            fast: false,
            slow: false,
            in_arena_center: false,
        }
    }

    fn stuck() -> RecoveryInput {
        RecoveryInput { stuck_now: true, ..idle() }
    }

    #[test]
    fn test_initial_state() {
        let r = Recovery::new(RecoveryConfig::default());
        let s = r.snapshot();
        assert!(!s.stuck);
        assert_eq!(s.episode_counter, 0);
        assert_eq!(s.forced_turn, Turn::Left);
        assert_eq!(s.previous_cell, None);
        assert!(!r.stuck_now(GridCell(0, 0)));
    }

    #[test]
    fn test_stuck_now_compares_cells() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.remember(GridCell(3, -4));
        assert!(r.stuck_now(GridCell(3, -4)));
        assert!(!r.stuck_now(GridCell(3, -5)));
    }

    #[test]
    fn test_counter_accumulates_then_triggers() {
        let mut r = Recovery::new(RecoveryConfig::default());
        for expected in [6, 12, 18, 24, 30, 36] {
            assert!(r.step(&stuck()).is_none());
            assert_eq!(r.snapshot().episode_counter, expected);
            assert!(!r.is_active());
        }
        assert!(r.step(&stuck()).is_none());
        assert!(r.is_active());
        assert_eq!(r.snapshot().episode_counter, 18);
    }

    #[test]
    fn test_movement_resets_counter() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.step(&stuck());
        r.step(&stuck());
        r.step(&idle());
        assert_eq!(r.snapshot().episode_counter, 0);
    }

    #[test]
    fn test_forced_turn_opposes_steering_while_free() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.step(&RecoveryInput { steering: Turn::Left, ..idle() });
        assert_eq!(r.snapshot().forced_turn, Turn::Right);
        r.step(&RecoveryInput { steering: Turn::Right, ..idle() });
        assert_eq!(r.snapshot().forced_turn, Turn::Left);

        // counter at 6 freezes the escape direction
        r.step(&RecoveryInput { steering: Turn::Left, ..stuck() });
        assert_eq!(r.snapshot().forced_turn, Turn::Left);
    }

    #[test]
    fn test_fast_episode_goes_straight() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.step(&RecoveryInput { target_behind: true, fast: true, ..idle() });
        let s = r.snapshot();
        assert!(s.stuck);
        assert_eq!(s.episode_counter, 36);
        assert_eq!(s.forced_turn, Turn::Straight);
    }

    #[test]
    fn test_episode_drains_to_exit() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.step(&RecoveryInput { target_behind: true, steering: Turn::Left, ..idle() });
        assert!(r.is_active());

        let mut frames = 0;
        while r.is_active() {
            let forced = r.step(&idle()).unwrap();
            assert_eq!(forced.acceleration, 0.0);
            assert_eq!(forced.steer, 1.0);
            frames += 1;
            assert!(frames <= 6);
        }
        assert_eq!(frames, 6);
        assert_eq!(r.snapshot().episode_counter, 0);
    }

    #[test]
    fn test_episode_exits_early_in_arena_center() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.step(&RecoveryInput { target_behind: true, ..idle() });
        let forced = r.step(&RecoveryInput { slow: true, in_arena_center: true, ..idle() });
        assert!(forced.is_some());
        assert!(!r.is_active());
    }

    #[test]
    fn test_reset() {
        let mut r = Recovery::new(RecoveryConfig::default());
        r.remember(GridCell(1, 1));
        r.step(&RecoveryInput { target_behind: true, ..idle() });
        r.reset();
        assert_eq!(r.snapshot(), Recovery::new(RecoveryConfig::default()).snapshot());
    }

    #[test]
    fn test_snapshot_serializes_turn_as_sign() {
        let r = Recovery::new(RecoveryConfig::default());
        let json = serde_json::to_value(r.snapshot()).unwrap();
        assert_eq!(json["forced_turn"], -1);
        assert!(json["previous_cell"].is_null());
    }
}
