//! Behavioural tests for the control policy

use proptest::prelude::*;
use rinkpilot_core::{AimPoint, GridCell, GroundPoint, Vec3, VehicleTelemetry};
use rinkpilot_drive::{orient, ControlPolicy, Turn};

/// Kart at ground position `(x, y)` heading down the rink at `speed`.
fn telemetry(x: f32, y: f32, speed: f32) -> VehicleTelemetry {
    VehicleTelemetry::new(
        Vec3::new(x, 0.0, y + 1.0),
        Vec3::new(x, 0.0, y),
        Vec3::new(0.0, 0.0, speed),
    )
}

fn cruising() -> VehicleTelemetry {
    telemetry(0.0, 0.0, 8.0)
}

fn aim(x: f32) -> AimPoint {
    AimPoint::new(x, 100.0)
}

#[test]
fn test_out_of_frame_aim_is_clamped() {
    let mut a = ControlPolicy::default();
    let mut b = ControlPolicy::default();
    let t = cruising();
    assert_eq!(
        a.control(AimPoint::new(500.0, -20.0), &t),
        b.control(AimPoint::new(400.0, 0.0), &t)
    );
    assert_eq!(a.recovery(), b.recovery());
}

#[test]
fn test_steering_dead_zone() {
    let cases = [(197.0, -1.0), (203.0, 1.0), (199.0, 0.0), (198.0, 0.0), (202.0, 0.0)];
    for (x, steer) in cases {
        let mut policy = ControlPolicy::default();
        let action = policy.control(aim(x), &cruising());
        assert_eq!(action.steer(), steer, "x = {}", x);
    }
}

#[test]
fn test_drift_near_edges() {
    let mut policy = ControlPolicy::default();
    let left = policy.control(aim(40.0), &cruising());
    assert!(left.drift());
    assert_eq!(left.acceleration(), 0.3);

    let mut policy = ControlPolicy::default();
    let right = policy.control(aim(360.0), &cruising());
    assert!(right.drift());
    assert_eq!(right.acceleration(), 0.3);

    let mut policy = ControlPolicy::default();
    let center = policy.control(aim(200.0), &cruising());
    assert!(!center.drift());
    assert_eq!(center.acceleration(), 1.0);
}

#[test]
fn test_never_requests_nitro_or_rescue() {
    let mut policy = ControlPolicy::default();
    for x in [0.0, 40.0, 120.0, 200.0, 330.0, 400.0] {
        let action = policy.control(aim(x), &telemetry(x / 10.0, 0.0, 12.0));
        assert!(!action.nitro());
        assert!(!action.rescue());
    }
}

#[test]
fn test_first_frame_is_never_stuck() {
    let mut policy = ControlPolicy::default();
    policy.control(aim(200.0), &telemetry(0.0, 0.0, 0.0));
    let snapshot = policy.recovery();
    assert_eq!(snapshot.episode_counter, 0);
    assert_eq!(snapshot.previous_cell, Some(GridCell(0, 0)));
}

#[test]
fn test_recovery_lifecycle_in_arena_center() {
    let mut policy = ControlPolicy::default();
    let wedged = telemetry(-3.0, 20.0, 0.0);

    policy.control(aim(200.0), &wedged);
    for _ in 0..7 {
        let action = policy.control(aim(200.0), &wedged);
        assert!(!action.brake());
    }
    let snapshot = policy.recovery();
    assert!(snapshot.stuck);
    assert_eq!(snapshot.episode_counter, 18);
    assert_eq!(snapshot.forced_turn, Turn::Left);

    let mut frames = 0;
    while policy.recovery().stuck {
        let action = policy.control(aim(200.0), &wedged);
        assert!(action.brake());
        assert_eq!(action.acceleration(), 0.0);
        assert_eq!(action.steer(), -1.0);
        frames += 1;
        assert!(frames <= 6);
    }
    assert_eq!(policy.recovery().episode_counter, 0);
}

#[test]
fn test_recovery_drains_outside_arena_center() {
    let mut policy = ControlPolicy::default();
    let wedged = telemetry(5.0, 60.0, 0.0);

    for _ in 0..8 {
        policy.control(aim(200.0), &wedged);
    }
    assert!(policy.recovery().stuck);

    let mut frames = 0;
    while policy.recovery().stuck {
        policy.control(aim(200.0), &wedged);
        frames += 1;
        assert!(frames <= 6);
    }
    assert_eq!(frames, 6);
}

#[test]
fn test_fast_kart_escapes_straight() {
    let mut policy = ControlPolicy::default();
    // target below the frame center triggers an episode right away
    policy.control(AimPoint::new(200.0, 200.0), &telemetry(0.0, 0.0, 15.0));
    let snapshot = policy.recovery();
    assert!(snapshot.stuck);
    assert_eq!(snapshot.episode_counter, 36);
    assert_eq!(snapshot.forced_turn, Turn::Straight);

    let action = policy.control(AimPoint::new(200.0, 100.0), &telemetry(0.0, 5.0, 15.0));
    assert!(action.brake());
    assert_eq!(action.steer(), 0.0);
}

#[test]
fn test_escape_turns_away_from_last_steering() {
    let mut policy = ControlPolicy::default();
    // steering left on the trigger frame
    policy.control(AimPoint::new(120.0, 200.0), &telemetry(0.0, 0.0, 8.0));
    assert_eq!(policy.recovery().forced_turn, Turn::Right);

    let action = policy.control(aim(120.0), &telemetry(0.0, 3.0, 8.0));
    assert_eq!(action.steer(), 1.0);
}

#[test]
fn test_short_contact_does_not_trigger_recovery() {
    let mut policy = ControlPolicy::default();
    for _ in 0..4 {
        policy.control(aim(200.0), &telemetry(0.0, 0.0, 6.0));
    }
    policy.control(aim(200.0), &telemetry(0.0, 2.0, 6.0));
    let snapshot = policy.recovery();
    assert!(!snapshot.stuck);
    assert_eq!(snapshot.episode_counter, 0);
}

#[test]
fn test_reset_clears_recovery() {
    let mut policy = ControlPolicy::default();
    policy.control(AimPoint::new(200.0, 250.0), &cruising());
    assert!(policy.recovery().stuck);

    policy.reset();
    assert_eq!(policy.recovery(), ControlPolicy::default().recovery());
}

#[test]
fn test_identical_frames_give_identical_actions() {
    let mut policy = ControlPolicy::default();
    // same aim, heading and speed, but the kart has moved to a new cell
    let first = policy.control(aim(250.0), &telemetry(5.0, -30.0, 9.0));
    let second = policy.control(aim(250.0), &telemetry(5.0, -20.0, 9.0));
    let snapshot = policy.recovery();
    assert!(!snapshot.stuck);
    assert_eq!(snapshot.episode_counter, 0);
    assert_eq!(snapshot.previous_cell, Some(GridCell(5, -20)));
    assert_eq!(first, second);
}

#[test]
fn test_vertical_heading_is_finite() {
    let o = orient(GroundPoint::new(0.0, 1.0), GroundPoint::new(0.0, 0.0), 65.0);
    assert!(o.intercept.is_finite());
}

proptest! {
    #[test]
    fn prop_clamping_precedes_every_rule(x in -1000.0f32..1000.0, y in -1000.0f32..1000.0) {
        let mut raw = ControlPolicy::default();
        let mut clamped = ControlPolicy::default();
        let t = cruising();
        let expected = clamped.control(AimPoint::new(x.clamp(0.0, 400.0), y.clamp(0.0, 300.0)), &t);
        prop_assert_eq!(raw.control(AimPoint::new(x, y), &t), expected);
    }

    #[test]
    fn prop_actions_stay_in_range(
        ax in -1000.0f32..1000.0,
        ay in -1000.0f32..1000.0,
        lx in -100.0f32..100.0,
        ly in -100.0f32..100.0,
        fx in -100.0f32..100.0,
        fy in -100.0f32..100.0,
        speed in 0.0f32..40.0,
    ) {
        let mut policy = ControlPolicy::default();
        let t = VehicleTelemetry::new(
            Vec3::new(fx, 0.0, fy),
            Vec3::new(lx, 0.0, ly),
            Vec3::new(speed, 0.0, 0.0),
        );
        for _ in 0..3 {
            let action = policy.control(AimPoint::new(ax, ay), &t);
            prop_assert!((0.0..=1.0).contains(&action.acceleration()));
            prop_assert!((-1.0..=1.0).contains(&action.steer()));
        }
    }

    #[test]
    fn prop_orientation_is_finite(
        fx in -100.0f32..100.0,
        fy in -100.0f32..100.0,
        lx in -100.0f32..100.0,
        ly in -100.0f32..100.0,
    ) {
        let o = orient(GroundPoint::new(fx, fy), GroundPoint::new(lx, ly), 65.0);
        prop_assert!(o.intercept.is_finite());
        prop_assert_eq!(o.facing_forward, fy > ly);
    }
}
