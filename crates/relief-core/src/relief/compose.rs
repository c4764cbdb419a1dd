//! Relief composition: filled elevation bands, Tanaka contour overlay, and
//! cartographic decorations, kept in vector form alongside the rasterized
//! pixmap. The vector scene is what the extrusion stage drapes over the 3D
//! surface; the pixmap is what gets persisted as the 2D artifact.

use std::path::Path;

use tiny_skia::{
    Color, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use crate::breaks::BreakSet;
use crate::elevation::ElevationField;
use crate::error::{ReliefError, Result};
use crate::palette::{Palette, Rgb};
use crate::relief::contour::{extract_contours, illumination, shade_to_unit, Point};
use crate::relief::font;

/// Fixed sun direction for the illuminated contours (NW, cartographic
/// convention).
pub const SUN_AZIMUTH_DEG: f64 = 315.0;

#[derive(Debug, Clone)]
pub struct ReliefParams {
    /// Output pixels per raster cell.
    pub pixels_per_cell: u32,
    /// Bounds of the modulated contour width, in output pixels.
    pub contour_width_min: f32,
    pub contour_width_max: f32,
    /// EMA factor applied to widths along a polyline; keeps thin contours
    /// from flickering between consecutive edges.
    pub width_smoothing: f32,
    /// Chaikin passes applied to extracted contours.
    pub smoothing_passes: u32,
}

impl Default for ReliefParams {
    fn default() -> Self {
        Self {
            pixels_per_cell: 3,
            contour_width_min: 0.8,
            contour_width_max: 2.6,
            width_smoothing: 0.5,
            smoothing_passes: 1,
        }
    }
}

/// One contour edge with its resolved Tanaka weight and tone.
#[derive(Debug, Clone)]
pub struct ContourStroke {
    pub a: Point,
    pub b: Point,
    /// Stroke width in output pixels.
    pub width: f32,
    pub color: Rgb,
}

#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb,
}

/// The vector form of a composed relief map. Region-scoped; never reused
/// across regions.
#[derive(Debug, Clone)]
pub struct ReliefScene {
    pub grid_w: usize,
    pub grid_h: usize,
    /// Band index per cell, already clamped to the palette; None = no data.
    pub bands: Vec<Option<u8>>,
    pub palette: Palette,
    pub strokes: Vec<ContourStroke>,
    pub legend: Vec<LegendEntry>,
    pub title: String,
    pub caption: String,
    /// Map units represented by the scale bar.
    pub scale_bar_units: f64,
    /// Map units per cell (for scale bar sizing in the 3D stage too).
    pub units_per_cell: f64,
    pub params: ReliefParams,
}

/// Composed 2D artifact: the vector scene plus its rasterization.
pub struct ReliefArtifact {
    pub scene: ReliefScene,
    pub pixmap: Pixmap,
}

// Decoration layout, in output pixels.
const MARGIN_SIDE: u32 = 14;
const TITLE_BAND: u32 = 40;
const FOOTER_BAND: u32 = 56;
const LEGEND_BAND: u32 = 130;
const SWATCH_W: u32 = 18;
const SWATCH_H: u32 = 12;

const INK: Rgb = Rgb::new(40, 40, 40);
const PAPER: Rgb = Rgb::new(250, 250, 248);

/// Compose the relief scene for one region and rasterize it.
///
/// Precondition (checked): the sample has at least one defined cell.
pub fn compose_relief(
    field: &ElevationField,
    breaks: &BreakSet,
    palette: &Palette,
    title: &str,
    caption: &str,
    params: &ReliefParams,
) -> Result<ReliefArtifact> {
    if field.is_empty_of_data() {
        return Err(ReliefError::NoData);
    }

    let scene = build_scene(field, breaks, palette, title, caption, params);
    let pixmap = rasterize_full(&scene)?;
    Ok(ReliefArtifact { scene, pixmap })
}

fn build_scene(
    field: &ElevationField,
    breaks: &BreakSet,
    palette: &Palette,
    title: &str,
    caption: &str,
    params: &ReliefParams,
) -> ReliefScene {
    let n_colors = palette.colors.len().max(1);

    // Band fill: lower-bound-inclusive lookup, clamped into the palette.
    let bands = field
        .data
        .iter()
        .map(|&v| {
            if v.is_nan() {
                None
            } else {
                Some(breaks.band_of(v as f64).min(n_colors - 1) as u8)
            }
        })
        .collect();

    let strokes = tanaka_strokes(field, breaks, palette, params);

    // Legend: one row per band, labels rounded to whole units.
    let legend = (0..breaks.band_count().min(n_colors))
        .map(|i| LegendEntry {
            label: format!(
                "{} - {}",
                breaks.values()[i].round() as i64,
                breaks.values()[i + 1].round() as i64
            ),
            color: palette.colors[i.min(n_colors - 1)],
        })
        .collect();

    ReliefScene {
        grid_w: field.width,
        grid_h: field.height,
        bands,
        palette: palette.clone(),
        strokes,
        legend,
        title: title.to_string(),
        caption: caption.to_string(),
        scale_bar_units: nice_scale_units(field),
        units_per_cell: field.cell_size_x(),
        params: params.clone(),
    }
}

/// Contour edges with illumination-modulated width and tone. Width follows
/// |cos| of the aspect/sun angle (lit and shaded sides both gain weight, the
/// neutral flanks stay thin), smoothed along each polyline; tone interpolates
/// the palette's dark→light accents.
fn tanaka_strokes(
    field: &ElevationField,
    breaks: &BreakSet,
    palette: &Palette,
    params: &ReliefParams,
) -> Vec<ContourStroke> {
    let s = params.pixels_per_cell as f32;
    let (w_min, w_max) = (params.contour_width_min, params.contour_width_max);
    let alpha = params.width_smoothing.clamp(0.05, 1.0);

    let mut strokes = Vec::new();
    for contour in extract_contours(field, breaks, params.smoothing_passes) {
        let mut width = (w_min + w_max) / 2.0;
        for pair in contour.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            let shade = illumination(field, mid.x, mid.y, SUN_AZIMUTH_DEG);

            let target = w_min + (w_max - w_min) * shade.abs() as f32;
            width += alpha * (target - width);

            let t = shade_to_unit(shade);
            let color = mix(palette.dark, palette.light, t);

            strokes.push(ContourStroke {
                a: Point::new(a.x * s, a.y * s),
                b: Point::new(b.x * s, b.y * s),
                width,
                color,
            });
        }
    }
    strokes
}

fn mix(a: Rgb, b: Rgb, t: f64) -> Rgb {
    let l = |x: u8, y: u8| -> u8 { (x as f64 + (y as f64 - x as f64) * t).round() as u8 };
    Rgb::new(l(a.r, b.r), l(a.g, b.g), l(a.b, b.b))
}

/// Round the scale bar to a 1/2/5×10ⁿ length near a quarter of the map width.
fn nice_scale_units(field: &ElevationField) -> f64 {
    let raw = (field.max_x - field.min_x).abs() / 4.0;
    if raw <= 0.0 {
        return 1.0;
    }
    let mag = 10f64.powf(raw.log10().floor());
    let mantissa = raw / mag;
    let nice = if mantissa < 1.5 {
        1.0
    } else if mantissa < 3.5 {
        2.0
    } else if mantissa < 7.5 {
        5.0
    } else {
        10.0
    };
    nice * mag
}

impl ReliefScene {
    fn skia_color(c: Rgb) -> Color {
        Color::from_rgba8(c.r, c.g, c.b, 255)
    }

    /// Pixel size of the map area (bands + contours, no decorations).
    pub fn map_size(&self) -> (u32, u32) {
        let s = self.params.pixels_per_cell;
        (self.grid_w as u32 * s, self.grid_h as u32 * s)
    }

    /// Rasterize only the map area. This is the texture the extrusion stage
    /// drapes over the displaced surface.
    pub fn rasterize_map(&self) -> Result<Pixmap> {
        let (w, h) = self.map_size();
        let mut pixmap = Pixmap::new(w.max(1), h.max(1))
            .ok_or_else(|| ReliefError::Compose("zero-sized map canvas".into()))?;
        pixmap.fill(Self::skia_color(PAPER));
        self.draw_map(&mut pixmap, 0.0, 0.0);
        Ok(pixmap)
    }

    fn draw_map(&self, pixmap: &mut Pixmap, ox: f32, oy: f32) {
        let s = self.params.pixels_per_cell as f32;
        let mut paint = Paint::default();
        paint.anti_alias = false;

        // Filled bands, one cell rect each; no-data stays background.
        for r in 0..self.grid_h {
            for c in 0..self.grid_w {
                let Some(band) = self.bands[r * self.grid_w + c] else {
                    continue;
                };
                let col = self.palette.colors[band as usize];
                paint.set_color(Self::skia_color(col));
                if let Some(rect) =
                    Rect::from_xywh(ox + c as f32 * s, oy + r as f32 * s, s, s)
                {
                    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
        }

        // Tanaka contour overlay.
        let mut stroke_paint = Paint::default();
        stroke_paint.anti_alias = true;
        let mut stroke = Stroke {
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        for cs in &self.strokes {
            let mut pb = PathBuilder::new();
            pb.move_to(ox + cs.a.x, oy + cs.a.y);
            pb.line_to(ox + cs.b.x, oy + cs.b.y);
            let Some(path) = pb.finish() else { continue };
            stroke.width = cs.width;
            stroke_paint.set_color(Self::skia_color(cs.color));
            pixmap.stroke_path(&path, &stroke_paint, &stroke, Transform::identity(), None);
        }
    }
}

/// Rasterize the full artifact: map area plus title, legend, scale bar,
/// north arrow, and caption.
fn rasterize_full(scene: &ReliefScene) -> Result<Pixmap> {
    let (map_w, map_h) = scene.map_size();
    let canvas_w = MARGIN_SIDE + map_w + LEGEND_BAND + MARGIN_SIDE;
    let canvas_h = TITLE_BAND + map_h + FOOTER_BAND;

    let mut pixmap = Pixmap::new(canvas_w.max(1), canvas_h.max(1))
        .ok_or_else(|| ReliefError::Compose("zero-sized canvas".into()))?;
    pixmap.fill(ReliefScene::skia_color(PAPER));

    scene.draw_map(&mut pixmap, MARGIN_SIDE as f32, TITLE_BAND as f32);

    // Title, centred over the map area.
    let title_w = font::text_width(&scene.title, 2);
    let tx = MARGIN_SIDE as i32 + (map_w as i32 - title_w as i32) / 2;
    font::draw_text(&mut pixmap, &scene.title, tx.max(2), 12, 2, INK);

    draw_legend(scene, &mut pixmap, MARGIN_SIDE + map_w + 12, TITLE_BAND);
    draw_scale_bar(scene, &mut pixmap, MARGIN_SIDE as i32, (TITLE_BAND + map_h + 10) as i32);
    draw_north_arrow(&mut pixmap, (MARGIN_SIDE + map_w).saturating_sub(24) as i32, (TITLE_BAND + 6) as i32);

    // Caption (provenance), bottom-left under the scale bar.
    font::draw_text(
        &mut pixmap,
        &scene.caption,
        MARGIN_SIDE as i32,
        (TITLE_BAND + map_h + 34) as i32,
        1,
        INK,
    );

    Ok(pixmap)
}

fn draw_legend(scene: &ReliefScene, pixmap: &mut Pixmap, x: u32, y: u32) {
    let mut paint = Paint::default();
    paint.anti_alias = false;

    font::draw_text(pixmap, "ELEVATION (M)", x as i32, y as i32, 1, INK);
    let mut cy = y + 14;
    for entry in &scene.legend {
        paint.set_color(ReliefScene::skia_color(entry.color));
        if let Some(rect) = Rect::from_xywh(x as f32, cy as f32, SWATCH_W as f32, SWATCH_H as f32) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
        font::draw_text(
            pixmap,
            &entry.label,
            (x + SWATCH_W + 6) as i32,
            cy as i32 + 2,
            1,
            INK,
        );
        cy += SWATCH_H + 4;
    }
}

fn draw_scale_bar(scene: &ReliefScene, pixmap: &mut Pixmap, x: i32, y: i32) {
    let s = scene.params.pixels_per_cell as f64;
    let px_per_unit = if scene.units_per_cell > 0.0 {
        s / scene.units_per_cell
    } else {
        s
    };
    let bar_px = (scene.scale_bar_units * px_per_unit).round().max(8.0) as f32;

    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(ReliefScene::skia_color(INK));
    if let Some(rect) = Rect::from_xywh(x as f32, y as f32, bar_px, 4.0) {
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }
    // End ticks.
    for tick_x in [x as f32, x as f32 + bar_px - 1.0] {
        if let Some(rect) = Rect::from_xywh(tick_x, y as f32 - 3.0, 1.0, 10.0) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }
    let label = format!("{} M", scene.scale_bar_units.round() as i64);
    font::draw_text(pixmap, &label, x + bar_px as i32 + 6, y - 2, 1, INK);
}

fn draw_north_arrow(pixmap: &mut Pixmap, x: i32, y: i32) {
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(ReliefScene::skia_color(INK));

    let mut pb = PathBuilder::new();
    pb.move_to(x as f32 + 6.0, y as f32 + 14.0);
    pb.line_to(x as f32 + 12.0, y as f32 + 14.0);
    pb.line_to(x as f32 + 9.0, y as f32);
    pb.close();
    if let Some(path) = pb.finish() {
        pixmap.fill_path(
            &path,
            &paint,
            tiny_skia::FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
    font::draw_text(pixmap, "N", x + 6, y + 18, 1, INK);
}

impl ReliefArtifact {
    /// Encode the rasterized artifact as PNG. The pixmap is fully opaque, so
    /// its premultiplied bytes are valid straight RGBA.
    pub fn to_image(&self) -> Result<image::RgbaImage> {
        image::RgbaImage::from_raw(
            self.pixmap.width(),
            self.pixmap.height(),
            self.pixmap.data().to_vec(),
        )
        .ok_or_else(|| ReliefError::Compose("pixmap/image size mismatch".into()))
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_image()?.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaks::compute_breaks;
    use crate::palette::build_palette;

    fn ramp_field() -> ElevationField {
        let mut f = ElevationField::new(16, 16, 0.0, 1600.0, 0.0, 1600.0, 0.0);
        for r in 0..16 {
            for c in 0..16 {
                f.set(r, c, (r * 60 + c) as f32); // 0..=915
            }
        }
        f
    }

    fn compose(field: &ElevationField) -> ReliefArtifact {
        let (lo, hi) = field.range().unwrap();
        let breaks = compute_breaks(lo as f64, hi as f64);
        let palette = build_palette(&breaks);
        compose_relief(
            field,
            &breaks,
            &palette,
            "Testshire",
            "ELEVATION: SYNTHETIC",
            &ReliefParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn all_nodata_is_rejected() {
        let f = ElevationField::empty(4, 4, 0.0, 4.0, 0.0, 4.0);
        let breaks = compute_breaks(0.0, 100.0);
        let palette = build_palette(&breaks);
        let err = compose_relief(&f, &breaks, &palette, "X", "Y", &ReliefParams::default());
        assert!(matches!(err, Err(ReliefError::NoData)));
    }

    #[test]
    fn artifact_has_expected_canvas_size() {
        let art = compose(&ramp_field());
        let (map_w, map_h) = art.scene.map_size();
        assert_eq!(map_w, 48); // 16 cells × 3 px
        assert_eq!(art.pixmap.width(), MARGIN_SIDE + map_w + LEGEND_BAND + MARGIN_SIDE);
        assert_eq!(art.pixmap.height(), TITLE_BAND + map_h + FOOTER_BAND);
    }

    #[test]
    fn nodata_cells_have_no_band() {
        let mut f = ramp_field();
        f.set(0, 0, f32::NAN);
        let art = compose(&f);
        assert_eq!(art.scene.bands[0], None);
        assert!(art.scene.bands[1].is_some());
    }

    #[test]
    fn legend_matches_band_count_and_rounds() {
        let art = compose(&ramp_field());
        let bands = art.scene.legend.len();
        assert!(bands >= 2);
        // labels are whole numbers
        for e in &art.scene.legend {
            assert!(e.label.split(" - ").all(|p| p.parse::<i64>().is_ok()), "{}", e.label);
        }
    }

    #[test]
    fn strokes_exist_and_widths_bounded() {
        let art = compose(&ramp_field());
        let p = ReliefParams::default();
        assert!(!art.scene.strokes.is_empty());
        for s in &art.scene.strokes {
            assert!(s.width >= p.contour_width_min * 0.99);
            assert!(s.width <= p.contour_width_max * 1.01);
        }
    }

    #[test]
    fn composition_is_deterministic() {
        let a = compose(&ramp_field());
        let b = compose(&ramp_field());
        assert_eq!(a.pixmap.data(), b.pixmap.data());
    }

    #[test]
    fn map_raster_is_map_sized() {
        let art = compose(&ramp_field());
        let tex = art.scene.rasterize_map().unwrap();
        let (w, h) = art.scene.map_size();
        assert_eq!((tex.width(), tex.height()), (w, h));
    }

    #[test]
    fn flat_field_composes_single_tone() {
        // zero-width bands must not divide by zero or panic
        let f = ElevationField::new(8, 8, 0.0, 8.0, 0.0, 8.0, 5.0);
        let breaks = compute_breaks(5.0, 5.0);
        let palette = build_palette(&breaks);
        let art =
            compose_relief(&f, &breaks, &palette, "Flats", "", &ReliefParams::default()).unwrap();
        let first = art.scene.bands[0];
        assert!(art.scene.bands.iter().all(|&b| b == first));
    }
}
