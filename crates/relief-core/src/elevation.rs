use serde::{Deserialize, Serialize};

/// A planar elevation raster for one region, row-major, elevations in metres.
/// No-data cells (outside the region boundary, ocean masks, sensor gaps) are
/// stored as `f32::NAN`. Coordinate math uses f64; elevation values use f32.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationField {
    /// Row-major elevation values in metres; NaN = no data.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl ElevationField {
    /// Create a new field filled with the given value.
    pub fn new(
        width: usize,
        height: usize,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        fill: f32,
    ) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// A field with every cell set to no-data.
    pub fn empty(width: usize, height: usize, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self::new(width, height, min_x, max_x, min_y, max_y, f32::NAN)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Width of one cell in map units.
    pub fn cell_size_x(&self) -> f64 {
        (self.max_x - self.min_x) / self.width.max(1) as f64
    }

    /// Height of one cell in map units.
    pub fn cell_size_y(&self) -> f64 {
        (self.max_y - self.min_y) / self.height.max(1) as f64
    }

    /// True when the sample is zero-sized or every cell is no-data.
    /// Such a region is unprocessable and must be skipped.
    pub fn is_empty_of_data(&self) -> bool {
        self.data.iter().all(|v| v.is_nan())
    }

    /// Floor all negative elevations to zero. Below-datum cells and ocean
    /// artifacts read as sea level from here on.
    pub fn clamp_below_sea(&mut self) {
        for v in &mut self.data {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
    }

    /// `(min, max)` over defined cells, or None if nothing is defined.
    pub fn range(&self) -> Option<(f32, f32)> {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for &v in &self.data {
            if v.is_nan() {
                continue;
            }
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo.is_finite() {
            Some((lo, hi))
        } else {
            None
        }
    }

    /// Sample the field at fractional grid coordinates using bilinear
    /// interpolation. Returns None outside the grid or when any of the four
    /// support cells is no-data.
    pub fn sample_grid(&self, fx: f64, fy: f64) -> Option<f32> {
        if fx < 0.0 || fy < 0.0 || fx > (self.width - 1) as f64 || fy > (self.height - 1) as f64 {
            return None;
        }

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = (fx - x0 as f64) as f32;
        let ty = (fy - y0 as f64) as f32;

        let v00 = self.get(y0, x0);
        let v10 = self.get(y0, x1);
        let v01 = self.get(y1, x0);
        let v11 = self.get(y1, x1);
        if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
            return None;
        }

        let v = v00 * (1.0 - tx) * (1.0 - ty)
            + v10 * tx * (1.0 - ty)
            + v01 * (1.0 - tx) * ty
            + v11 * tx * ty;

        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field() -> ElevationField {
        ElevationField::new(4, 4, 0.0, 4.0, 0.0, 4.0, 0.0)
    }

    #[test]
    fn range_skips_nodata() {
        let mut f = small_field();
        f.set(0, 0, 12.0);
        f.set(1, 1, -3.0);
        f.set(2, 2, f32::NAN);
        assert_eq!(f.range(), Some((-3.0, 12.0)));
    }

    #[test]
    fn all_nan_field_is_empty_of_data() {
        let f = ElevationField::empty(3, 3, 0.0, 3.0, 0.0, 3.0);
        assert!(f.is_empty_of_data());
        assert_eq!(f.range(), None);
    }

    #[test]
    fn clamp_floors_negatives_only() {
        let mut f = small_field();
        f.set(0, 0, -42.0);
        f.set(0, 1, 7.0);
        f.clamp_below_sea();
        assert_eq!(f.get(0, 0), 0.0);
        assert_eq!(f.get(0, 1), 7.0);
    }

    #[test]
    fn sample_grid_corners_exact() {
        let mut f = small_field();
        f.set(0, 0, 10.0);
        f.set(3, 3, 40.0);
        assert!((f.sample_grid(0.0, 0.0).unwrap() - 10.0).abs() < 1e-5);
        assert!((f.sample_grid(3.0, 3.0).unwrap() - 40.0).abs() < 1e-5);
    }

    #[test]
    fn sample_grid_rejects_nodata_support() {
        let mut f = small_field();
        f.set(1, 1, f32::NAN);
        assert!(f.sample_grid(0.5, 0.5).is_none());
        assert!(f.sample_grid(2.5, 2.5).is_some());
    }

    #[test]
    fn sample_grid_out_of_bounds() {
        let f = small_field();
        assert!(f.sample_grid(-0.1, 0.0).is_none());
        assert!(f.sample_grid(0.0, 5.0).is_none());
    }
}
