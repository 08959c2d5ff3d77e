//! Planner invariants: every wire segment a planned move emits starts and
//! ends at a velocity within the direction's velocity ceiling, consecutive
//! segments hand off velocity continuously, and the whole chain begins and
//! ends at rest.

use proptest::prelude::*;
use trapline_planner::vector::limit_vector;
use trapline_planner::{AxisVector, KinematicLimits, MotionPlanner};

fn finite_coord() -> impl Strategy<Value = f64> {
    prop_oneof![-50.0_f64..-1.0, 1.0_f64..50.0]
}

fn limits(v_max: f64, a_max: f64) -> KinematicLimits {
    KinematicLimits {
        v_max: AxisVector::new(vec![v_max, v_max]),
        a_max: AxisVector::new(vec![a_max, a_max]),
        junction_speed: 0.05,
        junction_deviation: 0.1,
    }
}

proptest! {
    /// A single `goto` always starts and ends its chain at rest, and no
    /// emitted segment's velocity (divided back out of the wire's
    /// microsteps/cos-scaling) exceeds the direction's velocity ceiling.
    #[test]
    fn goto_starts_and_ends_at_rest_and_respects_the_velocity_ceiling(
        dx in finite_coord(), dy in finite_coord(),
        v_max in 1.0_f64..20.0, a_max in 1.0_f64..20.0,
    ) {
        let kin_limits = limits(v_max, a_max);
        let microsteps = AxisVector::new(vec![1.0, 1.0]);
        let mut planner = MotionPlanner::new(kin_limits.clone(), microsteps, AxisVector::zeros(2));
        let target = AxisVector::new(vec![dx, dy]);

        let segments = planner.goto(target.clone()).expect("nonzero delta plans cleanly");
        prop_assert!(!segments.is_empty());
        prop_assert_eq!(segments.first().unwrap().start_velocity, 0.0);
        prop_assert_eq!(segments.last().unwrap().end_velocity, 0.0);

        let unit = target.scale(1.0 / target.norm());
        let v_cap = limit_vector(&unit, &kin_limits.v_max);
        // `goto` emits wire velocities scaled by `unit . microsteps` (here
        // identity) times `1e-6`; undo that to compare against the
        // planner's internal velocity ceiling.
        let v_scale = 1e-6;
        for segment in &segments {
            prop_assert!(segment.start_velocity / v_scale <= v_cap + 1e-6);
            prop_assert!(segment.end_velocity / v_scale <= v_cap + 1e-6);
        }
    }

    /// Consecutive segments in a single planned chain hand velocity off
    /// continuously: one segment's end velocity equals the next's start
    /// velocity, since nothing separates them but the junction pass.
    #[test]
    fn consecutive_segments_hand_off_velocity_continuously(
        dx in finite_coord(), dy in finite_coord(),
        v_max in 1.0_f64..20.0, a_max in 1.0_f64..20.0,
    ) {
        let kin_limits = limits(v_max, a_max);
        let microsteps = AxisVector::new(vec![1.0, 1.0]);
        let mut planner = MotionPlanner::new(kin_limits, microsteps, AxisVector::zeros(2));
        let segments = planner.goto(AxisVector::new(vec![dx, dy])).expect("nonzero delta plans cleanly");

        for pair in segments.windows(2) {
            prop_assert!((pair[0].end_velocity - pair[1].start_velocity).abs() < 1e-6);
        }
    }

    /// A multi-waypoint chain still begins and ends at rest regardless of
    /// how many intermediate corners it passes through.
    #[test]
    fn multi_waypoint_chain_begins_and_ends_at_rest(
        points in prop::collection::vec((finite_coord(), finite_coord()), 2..5),
        v_max in 1.0_f64..20.0, a_max in 1.0_f64..20.0,
    ) {
        let kin_limits = limits(v_max, a_max);
        let microsteps = AxisVector::new(vec![1.0, 1.0]);
        let mut planner = MotionPlanner::new(kin_limits, microsteps, AxisVector::zeros(2));
        let targets: Vec<AxisVector> = points.into_iter().map(|(x, y)| AxisVector::new(vec![x, y])).collect();

        let segments = planner.plan_moves(&targets, None).expect("planning succeeds");
        prop_assert!(!segments.is_empty());
        prop_assert_eq!(segments.first().unwrap().start_velocity, 0.0);
        prop_assert_eq!(segments.last().unwrap().end_velocity, 0.0);
    }
}
