//! Rectangle containment and parametric segment clipping
//!
//! Planar approximation: lon/lat are treated as x/y with no reprojection.
//! All boundary comparisons are exact (`<=`/`>=`, no epsilon), so a point
//! sitting exactly on an edge is inside. Coordinates repeated at an edge are
//! a deterministic case, not noise.

use crate::domain::types::Geofence;

/// Result of clipping a segment against a geofence.
///
/// `t_enter`/`t_exit` are parameters along the segment in `[0, 1]`;
/// `inside_fraction` is the share of the segment inside the rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipResult {
    pub t_enter: f64,
    pub t_exit: f64,
    pub inside_fraction: f64,
}

impl ClipResult {
    /// Segment misses the rectangle entirely
    pub const MISS: ClipResult = ClipResult { t_enter: 0.0, t_exit: 0.0, inside_fraction: 0.0 };

    /// Segment lies completely inside the rectangle
    pub const FULL: ClipResult = ClipResult { t_enter: 0.0, t_exit: 1.0, inside_fraction: 1.0 };
}

#[inline]
fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

impl Geofence {
    /// Point-in-rectangle test, inclusive on all four edges
    #[inline]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Liang-Barsky clip of the segment `(x0, y0) -> (x1, y1)`.
    ///
    /// Each rectangle edge contributes a half-plane constraint `t * p <= q`.
    /// Constraints with `p < 0` push the entry parameter up, those with
    /// `p > 0` pull the exit parameter down.
    ///
    /// A zero-length segment has no direction, so every `p` is zero and the
    /// half-plane test would only look at each edge in isolation. That case
    /// is answered by [`Geofence::contains`] instead: the whole (instantaneous)
    /// segment is inside or none of it is.
    pub fn clip_segment(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> ClipResult {
        let dx = x1 - x0;
        let dy = y1 - y0;

        if dx == 0.0 && dy == 0.0 {
            return if self.contains(x0, y0) { ClipResult::FULL } else { ClipResult::MISS };
        }

        // left, right, bottom, top
        let p = [-dx, dx, -dy, dy];
        let q = [x0 - self.min_lon, self.max_lon - x0, y0 - self.min_lat, self.max_lat - y0];

        let mut t_enter = 0.0_f64;
        let mut t_exit = 1.0_f64;

        for (&p_i, &q_i) in p.iter().zip(q.iter()) {
            if p_i == 0.0 {
                // Parallel to this edge: either fully on the inner side or fully outside
                if q_i < 0.0 {
                    return ClipResult::MISS;
                }
                continue;
            }

            let t = q_i / p_i;
            if p_i < 0.0 {
                t_enter = t_enter.max(t);
            } else {
                t_exit = t_exit.min(t);
            }
        }

        if t_enter > t_exit {
            return ClipResult::MISS;
        }

        let t_enter = clamp_unit(t_enter);
        let t_exit = clamp_unit(t_exit);

        ClipResult { t_enter, t_exit, inside_fraction: (t_exit - t_enter).max(0.0) }
    }
}
