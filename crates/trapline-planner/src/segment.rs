//! Geometric moves and their resolution into one or two velocity ramps.
//!
//! Grounded on `planner.py`'s `LineSegment`, `OtherEvent`, `KinematicLimits`,
//! `compute_junction_velocity`, and `plan_segment`.

use crate::error::PlannerError;
use crate::profile::{FirstOrder, ProfileSpec};
use crate::vector::{limit_value_by_axis, limit_vector, AxisVector};

/// Per-axis velocity/acceleration ceilings plus the two junction constants
/// from the grbl-style cornering speed estimate.
#[derive(Debug, Clone)]
pub struct KinematicLimits {
    /// Per-axis velocity ceiling.
    pub v_max: AxisVector,
    /// Per-axis acceleration ceiling.
    pub a_max: AxisVector,
    /// Floor applied to every computed junction velocity, including sharp
    /// reversals.
    pub junction_speed: f64,
    /// Target deviation from the ideal corner, used by the grbl-style
    /// cornering speed estimate.
    pub junction_deviation: f64,
}

/// A straight-line move, carrying an opaque caller tag that survives
/// subdivision, a velocity profile for the whole move at its nominal
/// speed, and the acceleration ceiling `amax` this segment's direction
/// permits.
#[derive(Debug, Clone)]
pub struct LineSegment {
    /// Opaque caller-supplied tag identifying the move this segment came
    /// from, preserved across subdivision.
    pub parent: u32,
    /// Starting point.
    pub start: AxisVector,
    /// Ending point.
    pub end: AxisVector,
    /// Unit direction vector from `start` to `end`.
    pub unit: AxisVector,
    /// Velocity profile along this segment.
    pub profile: FirstOrder,
    /// Acceleration ceiling this segment's direction permits.
    pub amax: f64,
}

impl LineSegment {
    /// Build a segment from two points and the desired entry/exit speeds.
    ///
    /// # Errors
    /// Returns [`PlannerError::ZeroLengthSegment`] if `start == end`.
    pub fn from_geo(
        parent: u32,
        v0: f64,
        v1: f64,
        start: AxisVector,
        end: AxisVector,
        limits: &KinematicLimits,
    ) -> Result<Self, PlannerError> {
        let delta = end.sub(&start);
        let length = delta.norm();
        if length == 0.0 {
            return Err(PlannerError::ZeroLengthSegment);
        }
        let unit = delta.scale(1.0 / length);
        let profile = FirstOrder::normalize(ProfileSpec {
            v0: Some(v0.abs()),
            v: Some(v1.abs()),
            x: Some(length),
            ..ProfileSpec::default()
        })?;
        let amax = limit_vector(&unit, &limits.a_max);
        Ok(Self { parent, start, end, unit, profile, amax })
    }

    pub(crate) fn with_profile(&self, profile: FirstOrder) -> Self {
        Self {
            parent: self.parent,
            start: self.start.clone(),
            end: self.end.clone(),
            unit: self.unit.clone(),
            profile,
            amax: self.amax,
        }
    }
}

/// A planner event that carries no geometry — e.g. a tool-state change that
/// must be emitted in sequence and only constrains the rolling velocity
/// ceiling around it. Exists for [`crate::plan::forward_pass`]'s generic
/// signature; the [`crate::plan::MotionPlanner`] facade never constructs
/// one itself.
#[derive(Debug, Clone)]
pub struct OtherEvent {
    /// The rolling velocity ceiling at this point in the sequence.
    pub v: f64,
}

/// One entry in a move sequence as it flows through the forward/backward
/// passes.
#[derive(Debug, Clone)]
pub enum PlanEvent {
    /// A geometric move.
    Line(LineSegment),
    /// A non-geometric event that only constrains the rolling ceiling.
    Other(OtherEvent),
}

/// The maximum speed a junction between two consecutive segments' unit
/// direction vectors can be taken at without exceeding `limits.a_max` on
/// any axis.
///
/// Grounded on `planner.py::compute_junction_velocity`, a grbl-style
/// centripetal-acceleration estimate from the cosine of the angle between
/// the two directions. Returns `None` for a collinear pair (no junction
/// limit at all), matching the original's `None` sentinel for "go as fast
/// as possible".
#[must_use]
pub fn compute_junction_velocity(
    previous: &LineSegment,
    current: &LineSegment,
    limits: &KinematicLimits,
) -> Option<f64> {
    let junction_cos = -current.unit.dot(&previous.unit);

    if junction_cos > 0.9999 {
        return Some(limits.junction_speed);
    }
    if junction_cos < -0.9999 {
        return None;
    }

    let raw = current.unit.sub(&previous.unit);
    let junction_unit = raw.scale(1.0 / raw.norm());
    let junction_acceleration = limit_value_by_axis(&limits.a_max, &junction_unit);
    let sin_theta_d2 = (0.5 * (1.0 - junction_cos)).sqrt();
    let junction_velocity =
        junction_acceleration * limits.junction_deviation * sin_theta_d2 / (1.0 - sin_theta_d2);
    Some(limits.junction_speed.max(junction_velocity))
}

/// Resolve `segment`'s profile against a rolling entry (or, in `reverse`
/// mode, exit) velocity ceiling `v`, subdividing into two segments if the
/// ceiling bites partway through.
///
/// Grounded on `planner.py::plan_segment`. In forward mode `v` caps
/// `segment`'s start velocity; in reverse mode (`reverse = true`) the
/// segment's profile is first reversed and `v` caps what becomes its new
/// "start" (really the original end) velocity, so subdividing a tail
/// deceleration is the same code path as subdividing a head acceleration.
///
/// # Errors
/// Propagates [`PlannerError::BadProfile`] if the underlying ramp
/// arithmetic is ever asked to resolve an ill-formed profile (unreachable
/// through this function's own call patterns; kept typed rather than
/// panicking).
pub fn plan_segment(
    segment: &LineSegment,
    v: f64,
    reverse: bool,
) -> Result<Vec<LineSegment>, PlannerError> {
    let a = segment.amax;
    let p = if reverse { segment.profile.reverse() } else { segment.profile };

    if p.v0 <= v {
        return Ok(vec![segment.clone()]);
    }

    let da = a - p.a;
    let dv = p.v0 - v;

    if da <= 0.0 || p.t * da <= dv {
        let p = if reverse {
            FirstOrder::normalize(ProfileSpec { v: Some(v), a: Some(-a), x: Some(p.x), ..ProfileSpec::default() })?
        } else {
            FirstOrder::normalize(ProfileSpec {
                v0: Some(v),
                a: Some(a),
                x: Some(segment.profile.x),
                ..ProfileSpec::default()
            })?
        };
        return Ok(vec![segment.with_profile(p)]);
    }

    let first_profile =
        FirstOrder::normalize(ProfileSpec { v0: Some(v), a: Some(a), t: Some(dv / da), ..ProfileSpec::default() })?;
    let second_profile = FirstOrder::normalize(ProfileSpec {
        v0: Some(first_profile.v),
        v: Some(p.v),
        x: Some(p.x - first_profile.x),
        ..ProfileSpec::default()
    })?;

    let (first_profile, second_profile) =
        if reverse { (second_profile.reverse(), first_profile.reverse()) } else { (first_profile, second_profile) };

    let crossing = segment.start.add(&segment.unit.scale(first_profile.x));

    Ok(vec![
        LineSegment {
            parent: segment.parent,
            start: segment.start.clone(),
            end: crossing.clone(),
            unit: segment.unit.clone(),
            profile: first_profile,
            amax: segment.amax,
        },
        LineSegment {
            parent: segment.parent,
            start: crossing,
            end: segment.end.clone(),
            unit: segment.unit.clone(),
            profile: second_profile,
            amax: segment.amax,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> KinematicLimits {
        KinematicLimits {
            v_max: AxisVector::new(vec![100.0, 100.0]),
            a_max: AxisVector::new(vec![10.0, 10.0]),
            junction_speed: 0.1,
            junction_deviation: 0.05,
        }
    }

    fn seg(parent: u32, end: Vec<f64>, v0: f64, v1: f64) -> LineSegment {
        LineSegment::from_geo(parent, v0, v1, AxisVector::zeros(2), AxisVector::new(end), &limits()).unwrap()
    }

    #[test]
    fn junction_velocity_is_floor_on_reversal() {
        let a = seg(0, vec![1.0, 0.0], 0.0, 0.0);
        let b = LineSegment::from_geo(
            1,
            0.0,
            0.0,
            AxisVector::new(vec![1.0, 0.0]),
            AxisVector::zeros(2),
            &limits(),
        )
        .unwrap();
        assert_eq!(compute_junction_velocity(&a, &b, &limits()), Some(limits().junction_speed));
    }

    #[test]
    fn junction_velocity_is_none_on_straight_line() {
        let a = seg(0, vec![1.0, 0.0], 0.0, 0.0);
        let b = LineSegment::from_geo(
            1,
            0.0,
            0.0,
            AxisVector::new(vec![1.0, 0.0]),
            AxisVector::new(vec![2.0, 0.0]),
            &limits(),
        )
        .unwrap();
        assert_eq!(compute_junction_velocity(&a, &b, &limits()), None);
    }

    #[test]
    fn plan_segment_passes_through_when_within_ceiling() {
        let s = seg(0, vec![1.0, 0.0], 0.0, 0.0);
        let out = plan_segment(&s, 0.0, false).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn plan_segment_subdivides_when_ceiling_bites_partway() {
        let s = seg(0, vec![50.0, 0.0], 20.0, 20.0);
        let out = plan_segment(&s, 1.0, false).unwrap();
        assert_eq!(out.len(), 2);
        let total_x: f64 = out.iter().map(|p| p.profile.x).sum();
        assert!((total_x - s.profile.x).abs() < 1e-6);
    }

    #[test]
    fn zero_length_segment_is_rejected() {
        let err = LineSegment::from_geo(0, 0.0, 0.0, AxisVector::zeros(2), AxisVector::zeros(2), &limits())
            .unwrap_err();
        assert_eq!(err, PlannerError::ZeroLengthSegment);
    }
}
