//! Forward/backward velocity passes, chunking, and the public planner
//! facade.
//!
//! Grounded on `planner.py`'s `forward_pass`, `backward_pass`,
//! `plan_segments`, and `MotionPlanner`.

use trapline_proto::messages::Segment as WireSegment;

use crate::error::PlannerError;
use crate::profile::{FirstOrder, ProfileSpec};
use crate::segment::{compute_junction_velocity, plan_segment, KinematicLimits, LineSegment, OtherEvent, PlanEvent};
use crate::vector::{limit_vector, AxisVector};

/// Clamp each segment's profile to the kinematic limits, apply the
/// junction-velocity ceiling between consecutive segments, and subdivide
/// any segment whose entry velocity exceeds what the rolling ceiling
/// allows.
///
/// Grounded on `planner.py::forward_pass`. `v0` is the caller's entry
/// velocity for the whole chain; `OtherEvent`s lower it in place and pass
/// through unchanged.
///
/// # Errors
/// Propagates [`PlannerError`] from profile normalization.
pub fn forward_pass(events: &[PlanEvent], v0: f64, limits: &KinematicLimits) -> Result<Vec<PlanEvent>, PlannerError> {
    let mut out = Vec::with_capacity(events.len());
    let mut v0 = v0;
    let mut prev: Option<LineSegment> = None;

    for event in events {
        let PlanEvent::Line(s) = event else {
            if let PlanEvent::Other(OtherEvent { v }) = event {
                v0 = v0.min(*v);
            }
            out.push(event.clone());
            continue;
        };

        let v_cap = limit_vector(&s.unit, &limits.v_max);
        if let Some(p) = &prev {
            if let Some(jv) = compute_junction_velocity(p, s, limits) {
                v0 = v0.min(jv);
            }
        }

        let mut profile = s.profile;
        let mut changed = false;
        if profile.v0 > v_cap || profile.v > v_cap {
            profile = FirstOrder::normalize(ProfileSpec {
                v0: Some(profile.v0.min(v_cap)),
                v: Some(profile.v.min(v_cap)),
                x: Some(profile.x),
                ..ProfileSpec::default()
            })?;
            changed = true;
        }
        if profile.a.abs() > s.amax {
            profile = FirstOrder::normalize(ProfileSpec {
                v0: Some(profile.v0),
                a: Some(s.amax * profile.a.signum()),
                x: Some(profile.x),
                ..ProfileSpec::default()
            })?;
            changed = true;
        }

        let clamped = if changed { s.with_profile(profile) } else { s.clone() };

        for sub in plan_segment(&clamped, v0, false)? {
            v0 = sub.profile.v;
            out.push(PlanEvent::Line(sub));
        }
        prev = Some(clamped);
    }

    Ok(out)
}

/// Mirror of [`forward_pass`] run back-to-front with a rolling exit
/// velocity. Grounded on `planner.py::backward_pass`.
///
/// # Errors
/// Propagates [`PlannerError`] from profile normalization.
pub fn backward_pass(events: &[PlanEvent], v1: f64) -> Result<Vec<PlanEvent>, PlannerError> {
    let mut out: Vec<Vec<PlanEvent>> = vec![Vec::new(); events.len()];
    let mut v = v1;

    for i in (0..events.len()).rev() {
        match &events[i] {
            PlanEvent::Other(other) => {
                v = v.min(other.v);
                out[i] = vec![PlanEvent::Other(other.clone())];
            }
            PlanEvent::Line(s) => {
                let planned = plan_segment(s, v, true)?;
                v = planned[0].profile.v0;
                out[i] = planned.into_iter().map(PlanEvent::Line).collect();
            }
        }
    }

    Ok(out.into_iter().flatten().collect())
}

/// Stream `events` through the forward pass, splitting into chunks at every
/// point the chain could fully decelerate to rest, and running each closed
/// chunk through the backward pass.
///
/// Grounded on `planner.py::plan_segments` (the free function, distinct
/// from [`MotionPlanner::plan_segments`]).
///
/// # Errors
/// Propagates [`PlannerError`] from either pass.
pub fn plan_segments_pass(
    events: &[PlanEvent],
    limits: &KinematicLimits,
    v0: f64,
    v1: f64,
) -> Result<Vec<PlanEvent>, PlannerError> {
    let forwarded = forward_pass(events, v0, limits)?;

    let mut result = Vec::new();
    let mut prev_chunk: Vec<PlanEvent> = Vec::new();
    let mut chunk: Vec<PlanEvent> = Vec::new();
    let mut v_start = v0;
    let mut v_end = v0;

    for event in forwarded {
        let PlanEvent::Line(s) = &event else {
            chunk.push(event);
            continue;
        };

        v_end = FirstOrder::minimum_speed(v_end, s.amax, s.profile.x);
        if v_end == 0.0 {
            if !prev_chunk.is_empty() {
                result.extend(backward_pass(&prev_chunk, v_start)?);
            }
            prev_chunk = chunk;
            chunk = vec![event.clone()];
            v_start = s.profile.v0;
            v_end = FirstOrder::minimum_speed(v_start, s.amax, s.profile.x);
        } else {
            chunk.push(event);
        }
    }

    if !prev_chunk.is_empty() {
        result.extend(backward_pass(&prev_chunk, v_start)?);
    }
    if !chunk.is_empty() {
        result.extend(backward_pass(&chunk, v1)?);
    }

    Ok(result)
}

/// Kinematic limits plus the microsteps-per-unit scale needed to convert
/// planned positions and velocities into the device's wire units.
pub struct MotionPlanner {
    limits: KinematicLimits,
    microsteps: AxisVector,
    position: AxisVector,
}

impl MotionPlanner {
    /// Build a planner at `position`, scaling planned motion into wire
    /// units via `microsteps`.
    #[must_use]
    pub fn new(limits: KinematicLimits, microsteps: AxisVector, position: AxisVector) -> Self {
        Self { limits, microsteps, position }
    }

    /// Replace the planner's idea of the current position. When `in_microsteps`
    /// is true, `p` is first divided elementwise by the microsteps scale.
    pub fn set_position(&mut self, p: AxisVector, in_microsteps: bool) {
        self.position = if in_microsteps {
            AxisVector::new(p.as_slice().iter().zip(self.microsteps.as_slice()).map(|(x, m)| x / m).collect())
        } else {
            p
        };
    }

    fn nominal_speed(&self) -> f64 {
        (self.limits.v_max.len() as f64).sqrt() * self.limits.v_max.as_slice().iter().cloned().fold(0.0, f64::max)
    }

    fn emit(&self, events: Vec<PlanEvent>) -> Vec<WireSegment> {
        events
            .into_iter()
            .filter_map(|event| {
                let PlanEvent::Line(s) = event else { return None };
                let v_scale = s.unit.component_mul(&self.microsteps).norm() * 1e-6;
                let end_microsteps: Vec<f64> =
                    s.end.as_slice().iter().zip(self.microsteps.as_slice()).map(|(e, m)| e * m).collect();
                Some(WireSegment {
                    move_id: s.parent,
                    move_flag: 0,
                    start_velocity: s.profile.v0 * v_scale,
                    end_velocity: s.profile.v * v_scale,
                    coords: end_microsteps,
                })
            })
            .collect()
    }

    /// Plan a sequence of straight-line moves through `targets`, each taken
    /// at `v` (or the planner's own nominal speed when `v` is `None`).
    ///
    /// # Errors
    /// Propagates [`PlannerError`] from the underlying passes.
    pub fn plan_moves(&mut self, targets: &[AxisVector], v: Option<f64>) -> Result<Vec<WireSegment>, PlannerError> {
        let v = v.unwrap_or_else(|| self.nominal_speed());

        let mut events = Vec::new();
        let mut prev = self.position.clone();
        for (index, target) in targets.iter().enumerate() {
            let delta = target.sub(&prev);
            if delta.norm() == 0.0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let parent = index as u32;
            let segment = LineSegment::from_geo(parent, v, v, prev.clone(), target.clone(), &self.limits)?;
            events.push(PlanEvent::Line(segment));
            prev = target.clone();
        }
        self.position = prev;

        let planned = plan_segments_pass(&events, &self.limits, 0.0, 0.0)?;
        Ok(self.emit(planned))
    }

    /// Plan a single move to `target`, returning its resolved wire
    /// segments.
    ///
    /// # Errors
    /// Propagates [`PlannerError`] from [`Self::plan_moves`].
    pub fn goto(&mut self, target: AxisVector) -> Result<Vec<WireSegment>, PlannerError> {
        self.plan_moves(std::slice::from_ref(&target), None)
    }

    /// A single incoming record to be re-planned: a target position
    /// (applied after `offset`) plus optional start/end velocity overrides.
    /// A non-positive override falls back to the nominal speed only when
    /// `adjust_velocity` is set — otherwise it is taken literally as the
    /// device's own "use whatever the firmware defaults to" sentinel.
    pub fn plan_segments(
        &mut self,
        records: &[PlanRecord],
        offset: &AxisVector,
        adjust_velocity: bool,
    ) -> Result<Vec<WireSegment>, PlannerError> {
        let nominal = self.nominal_speed();

        let mut events = Vec::new();
        let mut prev = self.position.clone();
        for record in records {
            let target = record.coords.add(offset);
            let delta = target.sub(&prev);
            if delta.norm() == 0.0 {
                continue;
            }
            let v0 = if adjust_velocity && record.start_velocity <= 0.0 { nominal } else { record.start_velocity };
            let v1 = if adjust_velocity && record.end_velocity <= 0.0 { nominal } else { record.end_velocity };
            let segment = LineSegment::from_geo(record.move_id, v0, v1, prev.clone(), target.clone(), &self.limits)?;
            events.push(PlanEvent::Line(segment));
            prev = target;
        }
        self.position = prev;

        if events.is_empty() {
            return Ok(Vec::new());
        }

        let planned = plan_segments_pass(&events, &self.limits, 0.0, 0.0)?;
        Ok(self.emit(planned))
    }
}

/// One record fed to [`MotionPlanner::plan_segments`]: a target plus
/// per-record velocity overrides, mirroring the subset of [`WireSegment`]
/// the planner's re-planning entry point consumes.
#[derive(Debug, Clone)]
pub struct PlanRecord {
    /// Caller-supplied identifier for this move, preserved across
    /// subdivision.
    pub move_id: u32,
    /// Desired entry speed.
    pub start_velocity: f64,
    /// Desired exit speed.
    pub end_velocity: f64,
    /// Absolute target coordinates.
    pub coords: AxisVector,
}
