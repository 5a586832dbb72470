//! Time attribution of a route against a geofence
//!
//! Movement between consecutive pings is assumed linear, so the time spent
//! inside the geofence over one interval is the elapsed time scaled by the
//! clipped fraction of the straight segment between the two samples.

use crate::domain::types::{AttributionResult, Geofence, Interval, Ping};

/// Seconds between two instants, at millisecond resolution
#[inline]
fn elapsed_seconds(from: &Ping, to: &Ping) -> f64 {
    (to.timestamp - from.timestamp).num_milliseconds() as f64 / 1000.0
}

/// Attribute inside-time for `pings` against `geofence`.
///
/// Pings may arrive in any order; they are stable-sorted by timestamp here,
/// so samples sharing a timestamp keep their input order. Fewer than two
/// pings yield the zero result.
///
/// Entry/exit counting follows the per-interval inside state: an interval is
/// "inside" when any part of it overlaps the geofence. A route therefore
/// ends with `entries - exits` equal to 0 or 1.
pub fn attribute(pings: &[Ping], geofence: &Geofence) -> AttributionResult {
    if pings.len() < 2 {
        return AttributionResult::default();
    }

    let mut sorted: Vec<&Ping> = pings.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let mut result = AttributionResult {
        intervals: Vec::with_capacity(sorted.len() - 1),
        ..AttributionResult::default()
    };
    let mut was_inside = false;

    for pair in sorted.windows(2) {
        let (from, to) = (pair[0], pair[1]);

        let seconds = elapsed_seconds(from, to);
        let inside_fraction =
            geofence.clip_segment(from.lon, from.lat, to.lon, to.lat).inside_fraction;

        result.total_seconds_inside += seconds * inside_fraction;
        result.intervals.push(Interval {
            start: from.timestamp,
            end: to.timestamp,
            seconds,
            inside_fraction,
        });

        let is_inside = inside_fraction > 0.0;
        match (was_inside, is_inside) {
            (false, true) => result.entries += 1,
            (true, false) => result.exits += 1,
            _ => {}
        }
        was_inside = is_inside;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn geofence() -> Geofence {
        Geofence::new(-118.5, -118.2, 34.0, 34.2)
    }

    fn t0() -> DateTime<Utc> {
        "2025-01-15T10:00:00Z".parse().unwrap()
    }

    fn ping(offset_secs: i64, lon: f64, lat: f64) -> Ping {
        Ping::new(t0() + Duration::seconds(offset_secs), lon, lat)
    }

    #[test]
    fn test_empty_pings() {
        let result = attribute(&[], &geofence());
        assert_eq!(result, AttributionResult::default());
    }

    #[test]
    fn test_single_ping_yields_zero_result() {
        let result = attribute(&[ping(0, -118.3, 34.1)], &geofence());
        assert!(result.intervals.is_empty());
        assert_eq!(result.total_seconds_inside, 0.0);
        assert_eq!(result.entries, 0);
        assert_eq!(result.exits, 0);
    }

    #[test]
    fn test_route_entirely_inside() {
        let pings = [ping(0, -118.4, 34.1), ping(120, -118.3, 34.15)];
        let result = attribute(&pings, &geofence());

        assert_eq!(result.total_seconds_inside, 120.0);
        assert_eq!(result.intervals.len(), 1);
        assert!((result.intervals[0].inside_fraction - 1.0).abs() < 1e-9);
        assert_eq!(result.intervals[0].seconds, 120.0);
        assert_eq!(result.entries, 1);
        assert_eq!(result.exits, 0);
    }

    #[test]
    fn test_route_entirely_outside() {
        let pings = [ping(0, -119.0, 34.5), ping(120, -118.9, 34.6)];
        let result = attribute(&pings, &geofence());

        assert_eq!(result.total_seconds_inside, 0.0);
        assert_eq!(result.intervals[0].inside_fraction, 0.0);
        assert_eq!(result.entries, 0);
        assert_eq!(result.exits, 0);
    }

    #[test]
    fn test_route_crossing_boundary() {
        let pings = [ping(0, -118.7, 34.1), ping(120, -118.1, 34.1)];
        let result = attribute(&pings, &geofence());

        assert!(result.total_seconds_inside > 0.0);
        assert!(result.total_seconds_inside < 120.0);
        // 0.3 of the 0.6 longitude span is inside
        assert!((result.total_seconds_inside - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_order_pings_are_sorted() {
        let pings = [ping(120, -118.3, 34.15), ping(0, -118.4, 34.1)];
        let result = attribute(&pings, &geofence());

        assert_eq!(result.total_seconds_inside, 120.0);
        assert_eq!(result.intervals[0].start, t0());
        assert_eq!(result.intervals[0].end, t0() + Duration::seconds(120));
    }

    #[test]
    fn test_permutation_invariance() {
        let sorted = [
            ping(0, -118.7, 34.1),
            ping(60, -118.4, 34.1),
            ping(120, -118.3, 34.15),
            ping(180, -118.0, 34.3),
            ping(240, -117.9, 34.4),
        ];
        let shuffled = [sorted[3], sorted[0], sorted[4], sorted[2], sorted[1]];

        let a = attribute(&sorted, &geofence());
        let b = attribute(&shuffled, &geofence());
        assert_eq!(a, b);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        // Two samples at t=60: first inside, second far outside
        let pings = [
            ping(0, -118.4, 34.1),
            ping(60, -118.3, 34.1),
            ping(60, -119.5, 35.0),
            ping(120, -119.6, 35.1),
        ];
        let result = attribute(&pings, &geofence());

        assert_eq!(result.intervals.len(), 3);
        assert_eq!(result.intervals[1].seconds, 0.0);
        // Zero-second jump from inside to outside still clips partially
        assert!(result.intervals[1].inside_fraction > 0.0);
        assert_eq!(result.intervals[2].inside_fraction, 0.0);
        assert_eq!(result.total_seconds_inside, 60.0);
        assert_eq!((result.entries, result.exits), (1, 1));
    }

    #[test]
    fn test_entry_exit_transitions() {
        // outside -> crossing -> inside -> crossing out -> outside -> crossing back in
        let pings = [
            ping(0, -118.8, 34.1),
            ping(60, -118.6, 34.1),
            ping(120, -118.4, 34.1),
            ping(180, -118.3, 34.1),
            ping(240, -118.0, 34.1),
            ping(300, -117.9, 34.1),
            ping(360, -118.3, 34.1),
        ];
        let result = attribute(&pings, &geofence());

        assert_eq!(result.entries, 2);
        assert_eq!(result.exits, 1);
        let delta = result.entries as i64 - result.exits as i64;
        assert!(delta == 0 || delta == 1);
    }

    #[test]
    fn test_stationary_inside_accrues_full_time() {
        let pings = [ping(0, -118.3, 34.1), ping(90, -118.3, 34.1)];
        let result = attribute(&pings, &geofence());
        assert_eq!(result.total_seconds_inside, 90.0);
        assert_eq!(result.entries, 1);
    }

    #[test]
    fn test_stationary_outside_on_one_axis() {
        let pings = [ping(0, -118.3, 34.5), ping(90, -118.3, 34.5)];
        let result = attribute(&pings, &geofence());
        assert_eq!(result.total_seconds_inside, 0.0);
        assert_eq!(result.entries, 0);
    }

    #[test]
    fn test_sub_second_resolution() {
        let start = t0();
        let pings = [
            Ping::new(start, -118.4, 34.1),
            Ping::new(start + Duration::milliseconds(1500), -118.3, 34.1),
        ];
        let result = attribute(&pings, &geofence());
        assert_eq!(result.intervals[0].seconds, 1.5);
        assert_eq!(result.total_seconds_inside, 1.5);
    }
}
