//! Hypsometric color ramps and per-region palette derivation.
//!
//! Band colors come from multi-stop interpolation over a fixed
//! elevation-themed gradient, low to high. Two accent tones (`light`/`dark`)
//! are derived for the illuminated-contour stage; when the terrain is too
//! uniform for a rich ramp they fall back to neutral white/black.

use crate::breaks::BreakSet;

/// RGB color, components in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Mix toward white by `factor` in [0, 1].
    pub fn lighten(self, factor: f64) -> Self {
        lerp_color(self, Self::WHITE, factor)
    }

    /// Mix toward black by `factor` in [0, 1].
    pub fn darken(self, factor: f64) -> Self {
        lerp_color(self, Self::BLACK, factor)
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
struct ColorStop {
    t: f64,
    color: Rgb,
}

impl ColorStop {
    const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self { t, color: Rgb::new(r, g, b) }
    }
}

/// Hypsometric gradient: coastal green through tan and brown to summit white.
const HYPSOMETRIC_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 26, 110, 58),
    ColorStop::new(0.20, 110, 160, 72),
    ColorStop::new(0.40, 208, 196, 112),
    ColorStop::new(0.60, 190, 140, 82),
    ColorStop::new(0.80, 146, 97, 74),
    ColorStop::new(1.00, 245, 244, 242),
];

/// Synthetic cool-to-warm substitute for degenerate/flat terrain.
const SYNTHETIC_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 59, 76, 192),
    ColorStop::new(0.33, 170, 199, 253),
    ColorStop::new(0.67, 245, 173, 130),
    ColorStop::new(1.00, 180, 4, 38),
];

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    if t <= 0.0 {
        return stops[0].color;
    }
    if t >= 1.0 {
        return stops[stops.len() - 1].color;
    }
    for i in 1..stops.len() {
        if t <= stops[i].t {
            let ratio = (t - stops[i - 1].t) / (stops[i].t - stops[i - 1].t);
            return lerp_color(stops[i - 1].color, stops[i].color, ratio);
        }
    }
    stops[stops.len() - 1].color
}

/// Sample `n` evenly spaced colors from a stop gradient, low to high.
fn sample_ramp(stops: &[ColorStop], n: usize) -> Vec<Rgb> {
    match n {
        0 => Vec::new(),
        1 => vec![multi_stop(stops, 0.5)],
        _ => (0..n)
            .map(|i| multi_stop(stops, i as f64 / (n - 1) as f64))
            .collect(),
    }
}

/// Most bands a palette will ever carry; cells in bands beyond this clamp to
/// the last color.
pub const MAX_BANDS: usize = 12;

/// How far the 2nd ramp color is pushed toward white for the lit accent.
const LIGHT_FACTOR: f64 = 0.15;
/// How far the 5th ramp color is pushed toward black for the shaded accent.
const DARK_FACTOR: f64 = 0.25;
/// Ramps shorter than this cannot yield stable accents; substitute instead.
const MIN_RICH_RAMP: usize = 6;

/// Ordered band colors plus the two illumination accent tones.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub colors: Vec<Rgb>,
    pub light: Rgb,
    pub dark: Rgb,
}

/// Build the palette for a break set.
///
/// One color per band, capped at [`MAX_BANDS`]. Rich ramps (≥ 6 colors)
/// derive `light`/`dark` accents from fixed ramp positions; short ramps are
/// discarded for the synthetic cool-to-warm substitute with neutral accents.
pub fn build_palette(breaks: &BreakSet) -> Palette {
    let k = breaks.band_count().min(MAX_BANDS);
    let ramp = sample_ramp(HYPSOMETRIC_STOPS, k);

    if ramp.len() >= MIN_RICH_RAMP {
        let light = ramp[1].lighten(LIGHT_FACTOR);
        let dark = ramp[4].darken(DARK_FACTOR);
        Palette { colors: ramp, light, dark }
    } else {
        Palette {
            colors: sample_ramp(SYNTHETIC_STOPS, k),
            light: Rgb::WHITE,
            dark: Rgb::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaks::compute_breaks;

    #[test]
    fn palette_len_is_band_count() {
        let b = compute_breaks(0.0, 2000.0); // coarse, 10 bands
        let p = build_palette(&b);
        assert_eq!(p.colors.len(), b.band_count());
    }

    #[test]
    fn palette_len_caps_at_twelve() {
        let b = compute_breaks(0.0, 5000.0); // 25 bands at step 200
        assert!(b.band_count() > MAX_BANDS);
        let p = build_palette(&b);
        assert_eq!(p.colors.len(), MAX_BANDS);
    }

    #[test]
    fn rich_ramp_derives_accents_from_ramp() {
        let b = compute_breaks(0.0, 2000.0);
        let p = build_palette(&b);
        assert!(p.colors.len() >= MIN_RICH_RAMP);
        assert_eq!(p.light, p.colors[1].lighten(LIGHT_FACTOR));
        assert_eq!(p.dark, p.colors[4].darken(DARK_FACTOR));
        assert_ne!(p.light, Rgb::WHITE);
        assert_ne!(p.dark, Rgb::BLACK);
    }

    #[test]
    fn short_ramp_substitutes_synthetic_with_neutral_accents() {
        let b = compute_breaks(10.0, 85.0); // [0,50,100] → 2 bands
        let p = build_palette(&b);
        assert_eq!(p.colors.len(), 2);
        assert_eq!(p.light, Rgb::WHITE);
        assert_eq!(p.dark, Rgb::BLACK);
        // cool-to-warm endpoints, not the hypsometric gradient
        assert_eq!(p.colors[0], Rgb::new(59, 76, 192));
        assert_eq!(p.colors[1], Rgb::new(180, 4, 38));
    }

    #[test]
    fn flat_region_gets_synthetic_palette() {
        let b = compute_breaks(5.0, 5.0); // 5 equal breaks → 4 bands
        let p = build_palette(&b);
        assert_eq!(p.colors.len(), 4);
        assert_eq!(p.light, Rgb::WHITE);
        assert_eq!(p.dark, Rgb::BLACK);
    }

    #[test]
    fn ramp_is_ordered_low_to_high() {
        let p = build_palette(&compute_breaks(0.0, 2000.0));
        // first color is the lowland green stop, last is near-white summit
        assert_eq!(*p.colors.first().unwrap(), Rgb::new(26, 110, 58));
        assert_eq!(*p.colors.last().unwrap(), Rgb::new(245, 244, 242));
    }

    #[test]
    fn lighten_darken_extremes() {
        let c = Rgb::new(100, 100, 100);
        assert_eq!(c.lighten(1.0), Rgb::WHITE);
        assert_eq!(c.darken(1.0), Rgb::BLACK);
        assert_eq!(c.lighten(0.0), c);
    }
}
