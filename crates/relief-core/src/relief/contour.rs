//! Contour extraction for the illuminated-contour overlay.
//!
//! Marching squares over the elevation raster at every break level, segment
//! chaining into polylines, Chaikin smoothing, and the per-point
//! illumination term that drives Tanaka-style line weight and tone.

use crate::breaks::BreakSet;
use crate::elevation::ElevationField;

/// A point in grid coordinates (column, row; fractional).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// One chained isoline at a single break level.
#[derive(Debug, Clone)]
pub struct Contour {
    pub level: f64,
    pub points: Vec<Point>,
    pub closed: bool,
}

/// Extract all contours for a break set: marching squares per level,
/// chaining, then `smoothing_passes` rounds of corner cutting.
pub fn extract_contours(
    field: &ElevationField,
    breaks: &BreakSet,
    smoothing_passes: u32,
) -> Vec<Contour> {
    let mut out = Vec::new();
    for &level in breaks.values() {
        let segments = march_squares(field, level as f32);
        for mut contour in connect_segments(segments) {
            contour.level = level;
            if smoothing_passes > 0 {
                contour = smooth_contour(&contour, smoothing_passes);
            }
            out.push(contour);
        }
    }
    out
}

/// Marching squares at one level. Cells touching a no-data corner are
/// skipped, so contours stop cleanly at the region boundary.
pub fn march_squares(field: &ElevationField, level: f32) -> Vec<Segment> {
    let (w, h) = (field.width, field.height);
    if w < 2 || h < 2 {
        return Vec::new();
    }

    let mut segments = Vec::new();
    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let tl = field.get(y, x);
            let tr = field.get(y, x + 1);
            let bl = field.get(y + 1, x);
            let br = field.get(y + 1, x + 1);
            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            let mut idx = 0u8;
            if tl >= level {
                idx |= 1;
            }
            if tr >= level {
                idx |= 2;
            }
            if br >= level {
                idx |= 4;
            }
            if bl >= level {
                idx |= 8;
            }

            segments.extend(cell_segments(idx, x as f32, y as f32, tl, tr, br, bl, level));
        }
    }
    segments
}

#[allow(clippy::too_many_arguments)]
fn cell_segments(
    idx: u8,
    x: f32,
    y: f32,
    tl: f32,
    tr: f32,
    br: f32,
    bl: f32,
    level: f32,
) -> Vec<Segment> {
    let top = cross(x, y, x + 1.0, y, tl, tr, level);
    let right = cross(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
    let bottom = cross(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
    let left = cross(x, y, x, y + 1.0, tl, bl, level);

    match idx {
        0 | 15 => vec![],
        1 | 14 => vec![Segment { start: left, end: top }],
        2 | 13 => vec![Segment { start: top, end: right }],
        3 | 12 => vec![Segment { start: left, end: right }],
        4 | 11 => vec![Segment { start: right, end: bottom }],
        5 => vec![
            Segment { start: left, end: top },
            Segment { start: right, end: bottom },
        ],
        6 | 9 => vec![Segment { start: top, end: bottom }],
        7 | 8 => vec![Segment { start: left, end: bottom }],
        10 => vec![
            Segment { start: top, end: right },
            Segment { start: left, end: bottom },
        ],
        _ => vec![],
    }
}

/// Where the level crosses the edge `(x1,y1)-(x2,y2)` with corner values
/// `v1`/`v2`, by linear interpolation.
fn cross(x1: f32, y1: f32, x2: f32, y2: f32, v1: f32, v2: f32, level: f32) -> Point {
    if (v2 - v1).abs() < 1e-6 {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }
    let t = ((level - v1) / (v2 - v1)).clamp(0.0, 1.0);
    Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Chain unordered segments into polylines by greedy endpoint matching.
pub fn connect_segments(segments: Vec<Segment>) -> Vec<Contour> {
    if segments.is_empty() {
        return Vec::new();
    }

    let eps = 1e-3f32;
    let mut used = vec![false; segments.len()];
    let mut contours = Vec::new();

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        let mut points = vec![segments[start].start, segments[start].end];
        used[start] = true;

        let mut grew = true;
        while grew {
            grew = false;
            let tail = *points.last().unwrap();
            for (i, seg) in segments.iter().enumerate() {
                if used[i] {
                    continue;
                }
                if dist(seg.start, tail) < eps {
                    points.push(seg.end);
                    used[i] = true;
                    grew = true;
                    break;
                }
                if dist(seg.end, tail) < eps {
                    points.push(seg.start);
                    used[i] = true;
                    grew = true;
                    break;
                }
            }
        }

        let closed = dist(points[0], *points.last().unwrap()) < eps;
        if points.len() >= 2 {
            contours.push(Contour { level: 0.0, points, closed });
        }
    }
    contours
}

fn dist(a: Point, b: Point) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Chaikin corner cutting. Keeps endpoints of open contours so lines still
/// meet the region boundary.
pub fn smooth_contour(contour: &Contour, iterations: u32) -> Contour {
    if iterations == 0 || contour.points.len() < 3 {
        return contour.clone();
    }

    let mut points = contour.points.clone();
    for _ in 0..iterations {
        let mut next = Vec::with_capacity(points.len() * 2);
        for i in 0..points.len() {
            let p1 = points[i];
            let p2 = if contour.closed {
                points[(i + 1) % points.len()]
            } else if i + 1 < points.len() {
                points[i + 1]
            } else {
                break;
            };
            next.push(Point::new(0.75 * p1.x + 0.25 * p2.x, 0.75 * p1.y + 0.25 * p2.y));
            next.push(Point::new(0.25 * p1.x + 0.75 * p2.x, 0.25 * p1.y + 0.75 * p2.y));
        }
        if !contour.closed && !points.is_empty() {
            next.insert(0, points[0]);
            if let Some(&last) = points.last() {
                next.push(last);
            }
        }
        points = next;
    }

    Contour { level: contour.level, points, closed: contour.closed }
}

/// Illumination term at a grid point: cosine of the angle between the local
/// downslope aspect and the sun azimuth. +1 = fully lit, −1 = fully shaded,
/// 0 on flat ground. Horn-style central differences; no-data neighbours
/// degrade to the centre value.
pub fn illumination(field: &ElevationField, x: f32, y: f32, azimuth_deg: f64) -> f64 {
    let col = (x.round() as isize).clamp(0, field.width as isize - 1) as usize;
    let row = (y.round() as isize).clamp(0, field.height as isize - 1) as usize;

    let at = |r: isize, c: isize| -> f64 {
        let r = r.clamp(0, field.height as isize - 1) as usize;
        let c = c.clamp(0, field.width as isize - 1) as usize;
        let v = field.get(r, c);
        if v.is_nan() {
            let centre = field.get(row, col);
            if centre.is_nan() {
                0.0
            } else {
                centre as f64
            }
        } else {
            v as f64
        }
    };

    let (r, c) = (row as isize, col as isize);
    let dz_dx = (at(r, c + 1) - at(r, c - 1)) / 2.0;
    let dz_dy = (at(r + 1, c) - at(r - 1, c)) / 2.0;

    if dz_dx.abs() < 1e-12 && dz_dy.abs() < 1e-12 {
        return 0.0;
    }

    // Downslope aspect, measured like a compass bearing (0 = north, cw).
    let aspect = (-dz_dx).atan2(dz_dy);
    let azimuth = azimuth_deg.to_radians();
    (aspect - azimuth).cos().clamp(-1.0, 1.0)
}

/// Clamp helper shared by the width/tone modulation: maps an illumination
/// term in [−1, 1] to [0, 1].
pub fn shade_to_unit(shade: f64) -> f64 {
    (shade + 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaks::compute_breaks;

    fn peak_field() -> ElevationField {
        // 3×3 with a single peak in the centre.
        let mut f = ElevationField::new(3, 3, 0.0, 3.0, 0.0, 3.0, 0.0);
        f.set(1, 1, 10.0);
        f
    }

    #[test]
    fn flat_field_has_no_contour() {
        let f = ElevationField::new(3, 3, 0.0, 3.0, 0.0, 3.0, 5.0);
        assert!(march_squares(&f, 5.0).is_empty());
    }

    #[test]
    fn peak_produces_ring() {
        let segs = march_squares(&peak_field(), 5.0);
        assert!(!segs.is_empty());
        let contours = connect_segments(segs);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].closed);
    }

    #[test]
    fn nodata_corner_suppresses_cell() {
        let mut f = peak_field();
        f.set(0, 0, f32::NAN);
        let with_hole = march_squares(&f, 5.0).len();
        let without = march_squares(&peak_field(), 5.0).len();
        assert!(with_hole < without);
    }

    #[test]
    fn cross_interpolates_halfway() {
        let p = cross(0.0, 0.0, 1.0, 0.0, 0.0, 10.0, 5.0);
        assert!((p.x - 0.5).abs() < 1e-5 && p.y.abs() < 1e-5);
    }

    #[test]
    fn smoothing_preserves_open_endpoints() {
        let c = Contour {
            level: 0.0,
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 0.0)],
            closed: false,
        };
        let s = smooth_contour(&c, 2);
        assert_eq!(s.points[0], c.points[0]);
        assert_eq!(*s.points.last().unwrap(), *c.points.last().unwrap());
        assert!(s.points.len() > c.points.len());
    }

    #[test]
    fn extract_contours_covers_all_levels() {
        let mut f = ElevationField::new(8, 8, 0.0, 8.0, 0.0, 8.0, 0.0);
        for r in 0..8 {
            for c in 0..8 {
                f.set(r, c, (r * 30) as f32); // south-to-north ramp 0..210
            }
        }
        let breaks = compute_breaks(0.0, 210.0); // coarse step → [0, 200]
        let contours = extract_contours(&f, &breaks, 1);
        assert!(contours.iter().any(|c| c.level == 200.0));
    }

    #[test]
    fn illumination_flat_is_zero() {
        let f = ElevationField::new(4, 4, 0.0, 4.0, 0.0, 4.0, 100.0);
        assert_eq!(illumination(&f, 2.0, 2.0, 315.0), 0.0);
    }

    #[test]
    fn illumination_bounded() {
        let mut f = ElevationField::new(5, 5, 0.0, 5.0, 0.0, 5.0, 0.0);
        for r in 0..5 {
            for c in 0..5 {
                f.set(r, c, (r * r + c) as f32 * 13.0);
            }
        }
        for y in 0..5 {
            for x in 0..5 {
                let s = illumination(&f, x as f32, y as f32, 315.0);
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn shade_to_unit_maps_range() {
        assert_eq!(shade_to_unit(-1.0), 0.0);
        assert_eq!(shade_to_unit(1.0), 1.0);
        assert_eq!(shade_to_unit(0.0), 0.5);
    }
}
