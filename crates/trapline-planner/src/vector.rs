//! A small runtime-sized axis vector.
//!
//! The planner's axis count (`NUM_AXIS`) is a handshake-time value, not a
//! compile-time const, so positions, velocities, and limits can't live in a
//! fixed-size array. The original implementation leans on numpy arrays for
//! this; nothing else in this workspace pulls in a linear-algebra crate for
//! a dynamically sized vector, so this is a small hand-rolled type rather
//! than a new dependency.

use std::ops::Index;

/// A vector with one component per axis, sized at runtime from the
/// handshake's axis count.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisVector(Vec<f64>);

impl AxisVector {
    /// Build a vector from its per-axis components.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// A zero vector with `axes` components.
    #[must_use]
    pub fn zeros(axes: usize) -> Self {
        Self(vec![0.0; axes])
    }

    /// Number of axes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this vector has zero axes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the per-axis components.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Consume the vector, returning its per-axis components.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Dot product with `other`.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Elementwise sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| a + b).collect())
    }

    /// Elementwise difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| a - b).collect())
    }

    /// Scale every component by `factor`.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|v| v * factor).collect())
    }

    /// Elementwise (Hadamard) product, used to convert between continuous
    /// machine units and integer microsteps.
    #[must_use]
    pub fn component_mul(&self, other: &Self) -> Self {
        Self(self.0.iter().zip(&other.0).map(|(a, b)| a * b).collect())
    }
}

impl Index<usize> for AxisVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

/// `1 / max_i(|direction_i| / limit_i)` — the largest scalar `a` such that
/// `|a * direction|` stays within `limit` on every axis. Used both for the
/// per-segment acceleration ceiling and the per-segment velocity ceiling.
#[must_use]
pub fn limit_vector(direction: &AxisVector, limit: &AxisVector) -> f64 {
    let max_ratio = direction
        .as_slice()
        .iter()
        .zip(limit.as_slice())
        .map(|(d, l)| (d / l).abs())
        .fold(0.0_f64, f64::max);
    1.0 / max_ratio
}

/// `min_i(|limit_i / vector_i|)` over axes where `vector_i != 0`, used by the
/// junction-velocity calculation. Axes the junction vector doesn't move
/// along impose no constraint, so they're skipped rather than dividing by
/// zero.
#[must_use]
pub fn limit_value_by_axis(limit: &AxisVector, vector: &AxisVector) -> f64 {
    let mut limit_value = 1e19_f64;
    for (l, v) in limit.as_slice().iter().zip(vector.as_slice()) {
        if *v != 0.0 {
            limit_value = limit_value.min((l / v).abs());
        }
    }
    limit_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_norm() {
        let a = AxisVector::new(vec![3.0, 4.0]);
        assert_eq!(a.norm(), 5.0);
        assert_eq!(a.dot(&a), 25.0);
    }

    #[test]
    fn limit_vector_picks_the_binding_axis() {
        let direction = AxisVector::new(vec![1.0, 0.5]);
        let limit = AxisVector::new(vec![2.0, 2.0]);
        // axis 0: 1/2 = 0.5, axis 1: 0.5/2 = 0.25 -> max is 0.5 -> 1/0.5 = 2
        assert_eq!(limit_vector(&direction, &limit), 2.0);
    }

    #[test]
    fn limit_value_by_axis_skips_zero_components() {
        let limit = AxisVector::new(vec![10.0, 10.0]);
        let vector = AxisVector::new(vec![0.0, 2.0]);
        assert_eq!(limit_value_by_axis(&limit, &vector), 5.0);
    }
}
