//! Classification breaks for elevation banding.
//!
//! The step adapts to relief: low-relief regions get a fine step so bands
//! stay visible, strongly varying terrain gets a fixed coarse step so the
//! palette is not diluted into thin slivers. Break values are anchored to the
//! 50 m grid so legend labels stay human-readable.

/// Strictly ordered classification boundaries for one region.
///
/// At least 2 values, except that a perfectly flat region degenerates to 5
/// identical values (a single zero-width band). Immutable once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakSet(Vec<f64>);

impl BreakSet {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fill bands between consecutive breaks.
    pub fn band_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Band index for an elevation value: lower bound inclusive, with values
    /// at or above the last break folding into the final band. When every
    /// break is equal (flat region) all values land in one band.
    pub fn band_of(&self, elevation: f64) -> usize {
        let n = self.band_count();
        if n == 0 {
            return 0;
        }
        for i in (0..n).rev() {
            if elevation >= self.0[i] {
                return i;
            }
        }
        0
    }
}

/// Fine-step threshold: spans below this get the adaptive step.
const COARSE_SPAN: f64 = 200.0;
/// Fixed step for strongly varying terrain.
const COARSE_STEP: f64 = 200.0;
/// Grid the break endpoints snap to.
const ANCHOR: f64 = 50.0;
/// Element count of the evenly-spaced degenerate fallback.
const FALLBACK_POINTS: usize = 5;

/// Derive the break step from the elevation span.
///
/// `span < 200` → `max(50, span/10 rounded to the nearest 10)`;
/// otherwise a fixed 200.
pub fn break_step(span: f64) -> f64 {
    if span < COARSE_SPAN {
        let rounded = ((span / 10.0) / 10.0).round() * 10.0;
        rounded.max(ANCHOR)
    } else {
        COARSE_STEP
    }
}

/// Compute the break set for a clamped elevation range `(lo, hi)`.
///
/// Breaks run from `floor(lo/50)*50` to `ceil(hi/50)*50` inclusive, stepping
/// by [`break_step`]. A flat range (`lo == hi`), or any step too large to
/// yield two values, falls back to 5 evenly spaced values over `[lo, hi]`.
pub fn compute_breaks(lo: f64, hi: f64) -> BreakSet {
    if lo == hi {
        return BreakSet(even_fallback(lo, hi));
    }

    let step = break_step(hi - lo) as i64;
    let start = (lo / ANCHOR).floor() as i64 * ANCHOR as i64;
    let end = (hi / ANCHOR).ceil() as i64 * ANCHOR as i64;

    // Integer walk: start, step, and end are all multiples of 10, so there is
    // no float accumulation drift to guard against.
    let mut breaks = Vec::new();
    let mut v = start;
    while v <= end {
        breaks.push(v as f64);
        v += step;
    }

    if breaks.len() < 2 {
        return BreakSet(even_fallback(lo, hi));
    }
    BreakSet(breaks)
}

/// 5 evenly spaced values spanning `[lo, hi]` exactly; all equal when flat.
fn even_fallback(lo: f64, hi: f64) -> Vec<f64> {
    (0..FALLBACK_POINTS)
        .map(|i| lo + (hi - lo) * i as f64 / (FALLBACK_POINTS - 1) as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_span_uses_fixed_200_step() {
        assert_eq!(break_step(200.0), 200.0);
        assert_eq!(break_step(1234.5), 200.0);
    }

    #[test]
    fn fine_span_step_is_rounded_and_floored_at_50() {
        // span 75 → 7.5 → nearest 10 → 10 → floored to 50
        assert_eq!(break_step(75.0), 50.0);
        // span 180 → 18 → nearest 10 → 20 → floored to 50
        assert_eq!(break_step(180.0), 50.0);
        // span 199 would need step 20, still floored to 50
        assert_eq!(break_step(199.0), 50.0);
    }

    #[test]
    fn range_10_85_yields_0_50_100() {
        let b = compute_breaks(10.0, 85.0);
        assert_eq!(b.values(), &[0.0, 50.0, 100.0]);
    }

    #[test]
    fn coarse_breaks_are_200_apart_from_50_anchor() {
        let b = compute_breaks(130.0, 910.0);
        assert_eq!(b.values(), &[100.0, 300.0, 500.0, 700.0, 900.0]);
        let steps: Vec<f64> = b.values().windows(2).map(|w| w[1] - w[0]).collect();
        assert!(steps.iter().all(|&s| s == 200.0));
    }

    #[test]
    fn fine_breaks_have_at_least_two_elements() {
        for (lo, hi) in [(0.0, 1.0), (12.0, 60.0), (49.0, 51.0), (0.0, 199.0)] {
            let b = compute_breaks(lo, hi);
            assert!(b.len() >= 2, "({lo},{hi}) gave {:?}", b.values());
            assert!(*b.values().first().unwrap() <= lo);
            assert!(*b.values().last().unwrap() >= hi);
        }
    }

    #[test]
    fn flat_range_degenerates_to_five_equal_values() {
        let b = compute_breaks(5.0, 5.0);
        assert_eq!(b.values(), &[5.0; 5]);
        assert_eq!(b.band_count(), 4);
        // zero-width bands must not panic; every value lands in one band
        assert!(b.band_of(5.0) < b.band_count());
        assert_eq!(b.band_of(5.0), b.band_of(6.0));
    }

    #[test]
    fn band_lookup_lower_inclusive() {
        let b = compute_breaks(10.0, 85.0); // [0, 50, 100]
        assert_eq!(b.band_of(0.0), 0);
        assert_eq!(b.band_of(49.9), 0);
        assert_eq!(b.band_of(50.0), 1);
        assert_eq!(b.band_of(100.0), 1); // top edge folds into last band
    }
}
