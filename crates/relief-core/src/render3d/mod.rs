//! Extrusion rendering: lift the composed 2D relief into a lit 3D scene.
//!
//! The built-in renderer ray-marches an orthographic camera against the
//! height-displaced surface, drapes the rasterized relief scene over it as a
//! texture, and shades with a fixed sun plus radiance sampled from the shared
//! environment panorama. Pixel rows render in parallel; that parallelism is
//! internal and never reorders work between regions.
//!
//! Every failure here is recoverable by design: the caller already holds the
//! 2D artifact and persists it as the fallback.

pub mod envmap;

use std::path::PathBuf;

use glam::Vec3;
use rayon::prelude::*;

use crate::elevation::ElevationField;
use crate::error::{ReliefError, Result};
use crate::relief::compose::{ReliefArtifact, SUN_AZIMUTH_DEG};
use envmap::EnvironmentMap;

/// Fixed parameters of the extrusion stage. One set per run; regions do not
/// get individual cameras.
#[derive(Debug, Clone)]
pub struct RenderParams {
    /// Vertical exaggeration applied to the normalized relief height.
    pub vertical_exaggeration: f64,
    /// Camera azimuth in degrees (compass bearing of the viewpoint).
    pub camera_azimuth_deg: f64,
    /// Camera elevation angle above the horizon, degrees.
    pub camera_elevation_deg: f64,
    /// Orthographic zoom; larger values frame the terrain tighter.
    pub zoom: f64,
    /// Square viewport edge, pixels.
    pub viewport: u32,
    /// Multiplier on the direct sun term.
    pub light_intensity: f32,
    /// Rotation of the environment panorama about the vertical axis.
    pub env_rotation_deg: f32,
    /// Fixed local cache path of the lighting asset.
    pub env_cache_path: PathBuf,
    /// Fixed remote source of the lighting asset.
    pub env_url: String,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            vertical_exaggeration: 1.6,
            camera_azimuth_deg: 315.0,
            camera_elevation_deg: 35.0,
            zoom: 0.8,
            viewport: 1200,
            light_intensity: 1.1,
            env_rotation_deg: 0.0,
            env_cache_path: std::env::temp_dir().join("relief-atlas/environment.hdr"),
            env_url: envmap::ENV_URL.to_string(),
        }
    }
}

/// Seam between the orchestrator and the 3D stage. The orchestrator treats
/// any error as "degrade this region to the 2D artifact".
pub trait Renderer3d {
    fn render(&mut self, artifact: &ReliefArtifact, field: &ElevationField)
        -> Result<image::RgbaImage>;
}

/// The built-in software extrusion renderer.
pub struct ExtrusionRenderer {
    params: RenderParams,
    env: Option<EnvironmentMap>,
}

impl ExtrusionRenderer {
    pub fn new(params: RenderParams) -> Self {
        Self { params, env: None }
    }

    /// Inject a pre-loaded panorama (tests, offline runs).
    pub fn with_environment(params: RenderParams, env: EnvironmentMap) -> Self {
        Self { params, env: Some(env) }
    }

    fn environment(&mut self) -> Result<&EnvironmentMap> {
        if self.env.is_none() {
            let loaded =
                EnvironmentMap::load_or_fetch(&self.params.env_cache_path, &self.params.env_url)?;
            self.env = Some(loaded);
        }
        Ok(self.env.as_ref().unwrap())
    }
}

impl Renderer3d for ExtrusionRenderer {
    fn render(
        &mut self,
        artifact: &ReliefArtifact,
        field: &ElevationField,
    ) -> Result<image::RgbaImage> {
        let params = self.params.clone();
        let env = self.environment()?;
        render_extrusion(artifact, field, &params, env)
    }
}

/// Background color outside the terrain silhouette.
const BACKDROP: [u8; 4] = [250, 250, 248, 255];
/// Share of shading carried by the environment term.
const AMBIENT_WEIGHT: f32 = 0.55;
/// Sun altitude above the horizon, matching the 2D contour illumination.
const SUN_ALTITUDE_DEG: f64 = 45.0;

struct Surface<'a> {
    field: &'a ElevationField,
    lo: f32,
    /// World z per metre of elevation; 0 for a flat region.
    z_scale: f32,
}

impl Surface<'_> {
    /// World-space surface height at fractional grid position, None over
    /// no-data.
    fn height(&self, x: f32, y: f32) -> Option<f32> {
        self.field
            .sample_grid(x as f64, y as f64)
            .map(|v| (v - self.lo) * self.z_scale)
    }

    fn normal(&self, x: f32, y: f32) -> Vec3 {
        let d = 1.0f32;
        let hc = self.height(x, y).unwrap_or(0.0);
        let hx0 = self.height(x - d, y).unwrap_or(hc);
        let hx1 = self.height(x + d, y).unwrap_or(hc);
        let hy0 = self.height(x, y - d).unwrap_or(hc);
        let hy1 = self.height(x, y + d).unwrap_or(hc);
        Vec3::new((hx0 - hx1) / (2.0 * d), (hy0 - hy1) / (2.0 * d), 1.0).normalize()
    }
}

/// Render one region's extrusion. Deterministic for fixed inputs.
pub fn render_extrusion(
    artifact: &ReliefArtifact,
    field: &ElevationField,
    params: &RenderParams,
    env: &EnvironmentMap,
) -> Result<image::RgbaImage> {
    if field.width < 2 || field.height < 2 {
        return Err(ReliefError::Render("field too small to extrude".into()));
    }
    let (lo, hi) = field.range().ok_or(ReliefError::NoData)?;

    let texture = artifact.scene.rasterize_map()?;
    let tex_scale = artifact.scene.params.pixels_per_cell as f32;

    let max_dim = field.width.max(field.height) as f32;
    let span = hi - lo;
    let relief_height = params.vertical_exaggeration as f32 * 0.2 * max_dim;
    let z_scale = if span > 0.0 { relief_height / span } else { 0.0 };
    let surface = Surface { field, lo, z_scale };

    // Orthographic camera basis, z up. Azimuth is a compass bearing in the
    // map plane (grid y grows southward, hence the negated cosine).
    let az = params.camera_azimuth_deg.to_radians();
    let el = params.camera_elevation_deg.to_radians();
    let toward_camera = Vec3::new(
        (az.sin() * el.cos()) as f32,
        (-az.cos() * el.cos()) as f32,
        el.sin() as f32,
    )
    .normalize();
    let view_dir = -toward_camera;
    let right = view_dir.cross(Vec3::Z).normalize();
    let up = right.cross(view_dir).normalize();

    let center = Vec3::new(
        field.width as f32 / 2.0,
        field.height as f32 / 2.0,
        relief_height / 2.0,
    );
    let half_extent = max_dim * 0.75 / params.zoom as f32;
    let camera_dist = max_dim * 2.0 + relief_height;

    let sun = sun_direction();
    let n_px = params.viewport;
    let step = 0.5f32; // world units per march step
    let max_steps = ((camera_dist * 2.0 + relief_height) / step) as usize;

    let rows: Vec<Vec<[u8; 4]>> = (0..n_px)
        .into_par_iter()
        .map(|py| {
            let mut row = Vec::with_capacity(n_px as usize);
            for px in 0..n_px {
                let sx = (px as f32 + 0.5) / n_px as f32 * 2.0 - 1.0;
                let sy = 1.0 - (py as f32 + 0.5) / n_px as f32 * 2.0;
                let origin = center + toward_camera * camera_dist
                    + right * (sx * half_extent)
                    + up * (sy * half_extent);

                row.push(march_ray(
                    origin, view_dir, step, max_steps, &surface, &texture, tex_scale, sun, env,
                    params,
                ));
            }
            row
        })
        .collect();

    let mut img = image::RgbaImage::new(n_px, n_px);
    for (y, row) in rows.into_iter().enumerate() {
        for (x, px) in row.into_iter().enumerate() {
            img.put_pixel(x as u32, y as u32, image::Rgba(px));
        }
    }
    Ok(img)
}

fn sun_direction() -> Vec3 {
    let az = SUN_AZIMUTH_DEG.to_radians();
    let alt = SUN_ALTITUDE_DEG.to_radians();
    Vec3::new(
        (az.sin() * alt.cos()) as f32,
        (-az.cos() * alt.cos()) as f32,
        alt.sin() as f32,
    )
    .normalize()
}

#[allow(clippy::too_many_arguments)]
fn march_ray(
    origin: Vec3,
    dir: Vec3,
    step: f32,
    max_steps: usize,
    surface: &Surface,
    texture: &tiny_skia::Pixmap,
    tex_scale: f32,
    sun: Vec3,
    env: &EnvironmentMap,
    params: &RenderParams,
) -> [u8; 4] {
    let mut prev_t = 0.0f32;
    let mut prev_above = true;

    let mut t = 0.0f32;
    for _ in 0..max_steps {
        let p = origin + dir * t;
        let inside = p.x >= 0.0
            && p.y >= 0.0
            && p.x <= (surface.field.width - 1) as f32
            && p.y <= (surface.field.height - 1) as f32;
        if inside {
            if let Some(h) = surface.height(p.x, p.y) {
                let above = p.z > h;
                if !above {
                    // Crossed the surface between prev_t and t; bisect.
                    let hit = if prev_above {
                        refine_hit(origin, dir, prev_t, t, surface)
                    } else {
                        p
                    };
                    return shade(hit, surface, texture, tex_scale, sun, env, params);
                }
                prev_above = above;
                prev_t = t;
            }
        } else if p.z < 0.0 && t > 0.0 {
            break; // passed below the terrain box without hitting it
        }
        t += step;
    }
    BACKDROP
}

fn refine_hit(origin: Vec3, dir: Vec3, mut t0: f32, mut t1: f32, surface: &Surface) -> Vec3 {
    for _ in 0..8 {
        let tm = (t0 + t1) / 2.0;
        let p = origin + dir * tm;
        match surface.height(p.x, p.y) {
            Some(h) if p.z > h => t0 = tm,
            _ => t1 = tm,
        }
    }
    origin + dir * t1
}

fn shade(
    hit: Vec3,
    surface: &Surface,
    texture: &tiny_skia::Pixmap,
    tex_scale: f32,
    sun: Vec3,
    env: &EnvironmentMap,
    params: &RenderParams,
) -> [u8; 4] {
    let normal = surface.normal(hit.x, hit.y);

    let tx = ((hit.x * tex_scale) as u32).min(texture.width() - 1);
    let ty = ((hit.y * tex_scale) as u32).min(texture.height() - 1);
    let base = texture
        .pixel(tx, ty)
        .map(|p| [p.red() as f32 / 255.0, p.green() as f32 / 255.0, p.blue() as f32 / 255.0])
        .unwrap_or([1.0; 3]);

    let lambert = normal.dot(sun).max(0.0) * params.light_intensity;
    let ambient = env.sample(normal, params.env_rotation_deg);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let lit = base[c] * (AMBIENT_WEIGHT * ambient[c] + (1.0 - AMBIENT_WEIGHT) * lambert + 0.15);
        out[c] = (lit.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    out[3] = 255;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaks::compute_breaks;
    use crate::palette::build_palette;
    use crate::relief::compose::{compose_relief, ReliefParams};

    fn hill_field(n: usize) -> ElevationField {
        let mut f = ElevationField::new(n, n, 0.0, n as f64, 0.0, n as f64, 0.0);
        let c = (n as f32 - 1.0) / 2.0;
        for r in 0..n {
            for col in 0..n {
                let d2 = (r as f32 - c).powi(2) + (col as f32 - c).powi(2);
                f.set(r, col, (900.0 * (-d2 / (c * c)).exp()).max(0.0));
            }
        }
        f
    }

    fn artifact_for(field: &ElevationField) -> ReliefArtifact {
        let (lo, hi) = field.range().unwrap();
        let breaks = compute_breaks(lo as f64, hi as f64);
        let palette = build_palette(&breaks);
        compose_relief(field, &breaks, &palette, "Hill", "", &ReliefParams::default()).unwrap()
    }

    fn small_params() -> RenderParams {
        RenderParams {
            viewport: 64,
            ..RenderParams::default()
        }
    }

    #[test]
    fn renders_viewport_sized_image() {
        let field = hill_field(24);
        let art = artifact_for(&field);
        let env = EnvironmentMap::constant([0.8; 3]);
        let img = render_extrusion(&art, &field, &small_params(), &env).unwrap();
        assert_eq!((img.width(), img.height()), (64, 64));
    }

    #[test]
    fn terrain_pixels_differ_from_backdrop() {
        let field = hill_field(24);
        let art = artifact_for(&field);
        let env = EnvironmentMap::constant([0.8; 3]);
        let img = render_extrusion(&art, &field, &small_params(), &env).unwrap();
        let non_backdrop = img.pixels().filter(|p| p.0 != BACKDROP).count();
        assert!(non_backdrop > 0, "expected some terrain in frame");
    }

    #[test]
    fn render_is_deterministic() {
        let field = hill_field(16);
        let art = artifact_for(&field);
        let env = EnvironmentMap::constant([0.7, 0.8, 0.9]);
        let a = render_extrusion(&art, &field, &small_params(), &env).unwrap();
        let b = render_extrusion(&art, &field, &small_params(), &env).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn flat_field_renders_without_division_by_zero() {
        let field = ElevationField::new(16, 16, 0.0, 16.0, 0.0, 16.0, 5.0);
        let art = {
            let breaks = compute_breaks(5.0, 5.0);
            let palette = build_palette(&breaks);
            compose_relief(&field, &breaks, &palette, "Flats", "", &ReliefParams::default())
                .unwrap()
        };
        let env = EnvironmentMap::constant([1.0; 3]);
        let img = render_extrusion(&art, &field, &small_params(), &env).unwrap();
        assert_eq!(img.width(), 64);
    }

    #[test]
    fn tiny_field_is_a_render_error() {
        let field = ElevationField::new(1, 1, 0.0, 1.0, 0.0, 1.0, 5.0);
        let art = artifact_for(&hill_field(8));
        let env = EnvironmentMap::constant([1.0; 3]);
        let err = render_extrusion(&art, &field, &small_params(), &env);
        assert!(matches!(err, Err(ReliefError::Render(_))));
    }

    #[test]
    fn renderer_caches_injected_environment() {
        let field = hill_field(16);
        let art = artifact_for(&field);
        let mut renderer = ExtrusionRenderer::with_environment(
            small_params(),
            EnvironmentMap::constant([0.9; 3]),
        );
        // two renders through the trait must not refetch anything
        let a = renderer.render(&art, &field).unwrap();
        let b = renderer.render(&art, &field).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
