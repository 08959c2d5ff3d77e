//! Errors raised while building or subdividing velocity profiles.

use thiserror::Error;

/// Errors raised while normalizing a velocity profile or building a segment.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlannerError {
    /// `FirstOrder::normalize` was called with a number of known fields
    /// other than exactly three of the five — a programmer error, not a
    /// runtime condition callers are expected to recover from.
    #[error("FirstOrder::normalize requires exactly three of {{v0, v, a, t, x}}")]
    BadProfile,

    /// A geometric move resolved to a zero-length displacement. The
    /// planner's geometric stage is expected to filter these out before a
    /// `LineSegment` is ever constructed; this is a defensive check against
    /// producing a NaN unit vector, not a path that should be reachable
    /// through the public API.
    #[error("cannot build a line segment with zero length")]
    ZeroLengthSegment,
}
