//! `FirstOrder`: a constant-acceleration velocity profile.
//!
//! Grounded on `planner.py`'s `FirstOrder` dataclass. Any three of its five
//! fields determine the other two via `v = v0 + a*t` and
//! `x = t*(v0+v)/2`; [`FirstOrder::normalize`] performs that resolution
//! from whichever three the caller happens to have in hand.

use crate::error::PlannerError;

/// A constant-acceleration ramp: starts at `v0`, ends at `v`, covers
/// distance `x` over duration `t` at acceleration `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstOrder {
    /// Starting speed.
    pub v0: f64,
    /// Ending speed.
    pub v: f64,
    /// Constant acceleration.
    pub a: f64,
    /// Duration.
    pub t: f64,
    /// Distance covered.
    pub x: f64,
}

/// The known subset of a `FirstOrder`'s five fields. Exactly three must be
/// `Some` for [`FirstOrder::normalize`] to resolve the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileSpec {
    /// Starting speed, if known.
    pub v0: Option<f64>,
    /// Ending speed, if known.
    pub v: Option<f64>,
    /// Constant acceleration, if known.
    pub a: Option<f64>,
    /// Duration, if known.
    pub t: Option<f64>,
    /// Distance covered, if known.
    pub x: Option<f64>,
}

impl FirstOrder {
    /// Resolve a full profile from exactly three known fields.
    ///
    /// Mirrors `FirstOrder.normalize`'s ten cases directly: which fields are
    /// `None` selects the pair of kinematic identities used to solve for
    /// the rest.
    #[allow(
        clippy::unwrap_used,
        reason = "the unknowns != 2 check above guarantees exactly three of v0/v/a/t/x are Some in every branch below"
    )]
    pub fn normalize(spec: ProfileSpec) -> Result<Self, PlannerError> {
        let ProfileSpec { v0, v, a, t, x } = spec;
        let unknowns = [v0, v, a, t, x].iter().filter(|f| f.is_none()).count();
        if unknowns != 2 {
            return Err(PlannerError::BadProfile);
        }

        if v0.is_none() {
            return Ok(if v.is_none() {
                let (a, t, x) = (a.unwrap(), t.unwrap(), x.unwrap());
                let v0 = x / t - a * t / 2.0;
                Self { v0, v: v0 + a * t, a, t, x }
            } else if a.is_none() {
                let (v, t, x) = (v.unwrap(), t.unwrap(), x.unwrap());
                let v0 = 2.0 * x / t - v;
                Self { v0, v, a: (v - v0) / t, t, x }
            } else if t.is_none() {
                let (v, a, x) = (v.unwrap(), a.unwrap(), x.unwrap());
                let v0 = (v * v - 2.0 * a * x).sqrt();
                Self { v0, v, a, t: (v - v0) / a, x }
            } else {
                let (v, a, t) = (v.unwrap(), a.unwrap(), t.unwrap());
                let v0 = v - a * t;
                Self { v0, v, a, t, x: t * (v0 + v) / 2.0 }
            });
        }
        let v0 = v0.unwrap();

        if v.is_none() {
            return Ok(if a.is_none() {
                let (t, x) = (t.unwrap(), x.unwrap());
                let v = 2.0 * x / t - v0;
                Self { v0, v, a: (v - v0) / t, t, x }
            } else if t.is_none() {
                let (a, x) = (a.unwrap(), x.unwrap());
                let v = (v0 * v0 + 2.0 * a * x).sqrt();
                Self { v0, v, a, t: (v - v0) / a, x }
            } else {
                let (a, t) = (a.unwrap(), t.unwrap());
                let v = v0 + a * t;
                Self { v0, v, a, t, x: t * (v0 + v) / 2.0 }
            });
        }
        let v = v.unwrap();

        if a.is_none() {
            return Ok(if t.is_none() {
                let x = x.unwrap();
                let t = 2.0 * x / (v0 + v);
                Self { v0, v, a: (v - v0) / t, t, x }
            } else {
                let t = t.unwrap();
                let a = (v - v0) / t;
                Self { v0, v, a, t, x: t * (v0 + v) / 2.0 }
            });
        }
        let a = a.unwrap();

        // Only t and x could still be unknown at this point.
        let t = (v - v0) / a;
        Ok(Self { v0, v, a, t, x: t * (v0 + v) / 2.0 })
    }

    /// Flip the profile's direction of travel: swap `v0`/`v`, negate `a`.
    /// `t` and `x` are unaffected — running a ramp backwards covers the same
    /// distance in the same time.
    #[must_use]
    pub fn reverse(&self) -> Self {
        Self { v0: self.v, v: self.v0, a: -self.a, t: self.t, x: self.x }
    }

    /// Check the two defining kinematic identities hold within `epsilon`.
    #[must_use]
    pub fn is_valid(&self, epsilon: f64) -> bool {
        let velocity_consistent = (self.v0 + self.a * self.t - self.v).abs() < epsilon;
        let distance_consistent = (self.t * (self.v + self.v0) - 2.0 * self.x).abs() < epsilon;
        velocity_consistent && distance_consistent
    }

    /// Starting at `v0` and decelerating at `amax`, what speed remains after
    /// covering distance `x` — or `0.0` if the ramp comes to a complete
    /// stop before then. Used by the chunking pass to detect points where
    /// the motion can be fully halted regardless of what follows.
    #[must_use]
    pub fn minimum_speed(v0: f64, amax: f64, x: f64) -> f64 {
        if 0.5 * v0 * v0 / amax <= x {
            return 0.0;
        }
        (v0 * v0 - 2.0 * amax * x).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_from_v0_a_t() {
        let p = FirstOrder::normalize(ProfileSpec {
            v0: Some(0.0),
            a: Some(2.0),
            t: Some(3.0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p.v, 6.0);
        assert_eq!(p.x, 9.0);
        assert!(p.is_valid(1e-9));
    }

    #[test]
    fn normalize_from_v0_v_x() {
        let p = FirstOrder::normalize(ProfileSpec {
            v0: Some(0.0),
            v: Some(4.0),
            x: Some(8.0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p.t, 4.0);
        assert_eq!(p.a, 1.0);
        assert!(p.is_valid(1e-9));
    }

    #[test]
    fn normalize_rejects_wrong_arity() {
        let err = FirstOrder::normalize(ProfileSpec { v0: Some(0.0), v: Some(1.0), ..Default::default() })
            .unwrap_err();
        assert_eq!(err, PlannerError::BadProfile);

        let err = FirstOrder::normalize(ProfileSpec {
            v0: Some(0.0),
            v: Some(1.0),
            a: Some(1.0),
            t: Some(1.0),
            x: Some(1.0),
        })
        .unwrap_err();
        assert_eq!(err, PlannerError::BadProfile);
    }

    #[test]
    fn reverse_swaps_endpoints_and_negates_acceleration() {
        let p = FirstOrder { v0: 1.0, v: 5.0, a: 2.0, t: 2.0, x: 6.0 };
        let r = p.reverse();
        assert_eq!(r, FirstOrder { v0: 5.0, v: 1.0, a: -2.0, t: 2.0, x: 6.0 });
    }

    #[test]
    fn minimum_speed_reaches_zero_when_distance_suffices() {
        // v0=4, amax=2: stopping distance is 0.5*16/2 = 4
        assert_eq!(FirstOrder::minimum_speed(4.0, 2.0, 10.0), 0.0);
        let remaining = FirstOrder::minimum_speed(4.0, 2.0, 1.0);
        assert!(remaining > 0.0);
    }
}
