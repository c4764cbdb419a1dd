/// Relief atlas orchestrator: renders a Tanaka-style 2D relief map for every
/// region in a boundary dataset, then attempts a lit 3D extrusion of each.
/// A region with no elevation data is skipped; a failed 3D render degrades to
/// the already-composed 2D artifact. Neither outcome stops the run.
///
/// Outputs per region, inside a timestamped batch directory:
///   <slug>-tanaka-2d.png          always (when elevation data exists)
///   <slug>-tanaka-3d.png          on 3D success
///   <slug>-tanaka-3d-failed.png   fallback copy of the 2D artifact
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use noise::{NoiseFn, Perlin};
use serde::Deserialize;

use relief_core::{
    build_palette, compose_relief, compute_breaks, ElevationField, ExtrusionRenderer,
    ReliefParams, RenderParams, Renderer3d,
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Synthetic terrain: fBm octaves and amplitude envelope (metres).
const SYNTH_OCTAVES: u32 = 6;
const SYNTH_AMPLITUDE: f64 = 800.0;
const SYNTH_BASE: f64 = 150.0;
const SYNTH_FREQ: f64 = 2.5;

/// Caption recorded on every artifact, naming the elevation provenance.
const CAPTION_SYNTHETIC: &str = "ELEVATION: SYNTHETIC FBM";
const CAPTION_FIELDS: &str = "ELEVATION: SAMPLED FIELDS";

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "atlas",
    about = "Render Tanaka-style relief maps (2D + 3D extrusion) per region"
)]
struct Args {
    /// Path to regions.json (boundary polygons with a name per record)
    #[arg(long, default_value = "data/regions.json")]
    regions: PathBuf,

    /// Output root; each run creates a timestamped batch directory inside
    #[arg(short, long, default_value = "data/output")]
    output: PathBuf,

    /// Raster resolution of the long bbox edge, in cells
    #[arg(long, default_value = "160")]
    resolution: usize,

    /// Directory of pre-sampled ElevationField JSON files (<slug>.json);
    /// omit to synthesize deterministic fBm terrain instead
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Seed for the synthetic elevation source
    #[arg(long, default_value = "42")]
    seed: u32,

    /// Compose 2D artifacts only; never attempt the 3D stage
    #[arg(long)]
    skip_3d: bool,

    /// Process only the region with this name (omit to process all)
    #[arg(long)]
    region: Option<String>,
}

// ── regions.json schema ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegionsFile {
    regions: Vec<RegionDef>,
}

#[derive(Deserialize, Clone)]
struct RegionDef {
    name: String,
    /// Boundary ring in planar coordinates, implicitly closed.
    boundary: Vec<[f64; 2]>,
}

/// File-name slug: trimmed, lowercased, whitespace runs collapsed to `-`.
/// Deterministic, so reruns into the same batch directory overwrite.
fn slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

// ── Geometry helpers ─────────────────────────────────────────────────────────

fn bbox(ring: &[[f64; 2]]) -> Option<(f64, f64, f64, f64)> {
    if ring.len() < 3 {
        return None;
    }
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for &[x, y] in ring {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if max_x > min_x && max_y > min_y {
        Some((min_x, max_x, min_y, max_y))
    } else {
        None
    }
}

/// Even-odd ray cast against the implicitly closed boundary ring.
fn point_in_ring(x: f64, y: f64, ring: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Mask every cell whose centre lies outside the boundary to no-data.
/// Row 0 is the northern edge.
fn clip_to_boundary(field: &mut ElevationField, ring: &[[f64; 2]]) {
    let sx = field.cell_size_x();
    let sy = field.cell_size_y();
    for r in 0..field.height {
        for c in 0..field.width {
            let x = field.min_x + (c as f64 + 0.5) * sx;
            let y = field.max_y - (r as f64 + 0.5) * sy;
            if !point_in_ring(x, y, ring) {
                field.set(r, c, f32::NAN);
            }
        }
    }
}

// ── Elevation sources ────────────────────────────────────────────────────────

/// Raster acquisition seam. Real deployments plug a terrain service in here;
/// the built-in sources keep the tool runnable standalone.
trait ElevationSource {
    fn fetch(&self, region: &RegionDef, resolution: usize) -> Result<ElevationField>;
    fn caption(&self) -> &'static str;
}

/// Deterministic fBm terrain, seeded per region name. Amplitudes dip below
/// zero on purpose; the pipeline's sea-level clamp handles them.
struct SyntheticSource {
    seed: u32,
}

impl SyntheticSource {
    fn region_seed(&self, name: &str) -> u32 {
        name.bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
    }

    fn fbm(noise: &Perlin, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut amp = 1.0;
        let mut freq = 1.0;
        for _ in 0..SYNTH_OCTAVES {
            value += amp * noise.get([x * freq, y * freq]);
            amp *= 0.5;
            freq *= 2.0;
        }
        value
    }
}

impl ElevationSource for SyntheticSource {
    fn fetch(&self, region: &RegionDef, resolution: usize) -> Result<ElevationField> {
        let Some((min_x, max_x, min_y, max_y)) = bbox(&region.boundary) else {
            bail!("degenerate boundary ({} points)", region.boundary.len());
        };

        let (span_x, span_y) = (max_x - min_x, max_y - min_y);
        let long_edge = span_x.max(span_y);
        let width = ((span_x / long_edge) * resolution as f64).round().max(2.0) as usize;
        let height = ((span_y / long_edge) * resolution as f64).round().max(2.0) as usize;

        let noise = Perlin::new(self.region_seed(&region.name));
        let mut field = ElevationField::new(width, height, min_x, max_x, min_y, max_y, 0.0);
        for r in 0..height {
            for c in 0..width {
                let nx = c as f64 / width as f64 * SYNTH_FREQ;
                let ny = r as f64 / height as f64 * SYNTH_FREQ;
                let v = SYNTH_BASE + SYNTH_AMPLITUDE * Self::fbm(&noise, nx, ny);
                field.set(r, c, v as f32);
            }
        }
        clip_to_boundary(&mut field, &region.boundary);
        Ok(field)
    }

    fn caption(&self) -> &'static str {
        CAPTION_SYNTHETIC
    }
}

/// Pre-sampled rasters: one `<slug>.json` ElevationField per region.
struct FieldDirSource {
    dir: PathBuf,
}

impl ElevationSource for FieldDirSource {
    fn fetch(&self, region: &RegionDef, _resolution: usize) -> Result<ElevationField> {
        let path = self.dir.join(format!("{}.json", slug(&region.name)));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let mut field: ElevationField = serde_json::from_str(&text)
            .with_context(|| format!("Bad field JSON: {}", path.display()))?;
        if region.boundary.len() >= 3 {
            clip_to_boundary(&mut field, &region.boundary);
        }
        Ok(field)
    }

    fn caption(&self) -> &'static str {
        CAPTION_FIELDS
    }
}

// ── Per-region pipeline ──────────────────────────────────────────────────────

/// Terminal state of one region's processing turn.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// No usable elevation data; nothing was rendered.
    Skipped(String),
    /// 2D artifact plus successful 3D extrusion.
    Rendered,
    /// 2D artifact only, by request (--skip-3d).
    TwoDOnly,
    /// 3D failed; the 2D artifact was persisted under the failed name.
    Fallback(String),
}

/// Run one region through the full pipeline. Only unrecoverable I/O (PNG or
/// directory writes) escapes as `Err`; everything else is an `Outcome`.
fn process_region(
    region: &RegionDef,
    source: &dyn ElevationSource,
    renderer: &mut dyn Renderer3d,
    out_dir: &Path,
    resolution: usize,
    skip_3d: bool,
) -> Result<Outcome> {
    let mut field = match source.fetch(region, resolution) {
        Ok(f) => f,
        Err(e) => return Ok(Outcome::Skipped(format!("acquisition failed: {e}"))),
    };

    if field.is_empty_of_data() {
        return Ok(Outcome::Skipped("no elevation data".into()));
    }

    // Ocean artifacts and below-datum cells read as sea level from here on.
    field.clamp_below_sea();
    let Some((lo, hi)) = field.range() else {
        return Ok(Outcome::Skipped("no elevation data".into()));
    };

    let breaks = compute_breaks(lo as f64, hi as f64);
    let palette = build_palette(&breaks);
    let artifact = match compose_relief(
        &field,
        &breaks,
        &palette,
        &region.name,
        source.caption(),
        &ReliefParams::default(),
    ) {
        Ok(a) => a,
        Err(e) => return Ok(Outcome::Skipped(format!("composition failed: {e}"))),
    };

    let slug = slug(&region.name);
    let path_2d = out_dir.join(format!("{slug}-tanaka-2d.png"));
    artifact
        .save_png(&path_2d)
        .with_context(|| format!("Write failed: {}", path_2d.display()))?;

    if skip_3d {
        return Ok(Outcome::TwoDOnly);
    }

    match renderer.render(&artifact, &field) {
        Ok(img) => {
            let path_3d = out_dir.join(format!("{slug}-tanaka-3d.png"));
            img.save(&path_3d)
                .with_context(|| format!("Write failed: {}", path_3d.display()))?;
            Ok(Outcome::Rendered)
        }
        Err(e) => {
            let path_failed = out_dir.join(format!("{slug}-tanaka-3d-failed.png"));
            artifact
                .save_png(&path_failed)
                .with_context(|| format!("Write failed: {}", path_failed.display()))?;
            Ok(Outcome::Fallback(e.to_string()))
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    let regions_text = fs::read_to_string(&args.regions)
        .with_context(|| format!("Cannot read {}", args.regions.display()))?;
    let regions_file: RegionsFile =
        serde_json::from_str(&regions_text).context("Failed to parse regions.json")?;

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before epoch")?
        .as_secs();
    let out_dir = args.output.join(format!("tanaka-{stamp}"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Cannot create {}", out_dir.display()))?;

    let source: Box<dyn ElevationSource> = match &args.fields {
        Some(dir) => Box::new(FieldDirSource { dir: dir.clone() }),
        None => Box::new(SyntheticSource { seed: args.seed }),
    };
    let mut renderer = ExtrusionRenderer::new(RenderParams::default());

    let (mut rendered, mut fallbacks, mut skipped) = (0usize, 0usize, 0usize);
    for region in &regions_file.regions {
        if let Some(ref filter) = args.region {
            if &region.name != filter {
                continue;
            }
        }

        eprintln!("[atlas] Region: {}", region.name);
        let outcome = process_region(
            region,
            source.as_ref(),
            &mut renderer,
            &out_dir,
            args.resolution,
            args.skip_3d,
        )?;

        match outcome {
            Outcome::Skipped(reason) => {
                eprintln!("  [warn] Skipped: {reason}");
                skipped += 1;
            }
            Outcome::Rendered => {
                eprintln!("  → 2D + 3D rendered");
                rendered += 1;
            }
            Outcome::TwoDOnly => {
                eprintln!("  → 2D rendered (3D disabled)");
                rendered += 1;
            }
            Outcome::Fallback(reason) => {
                eprintln!("  [warn] 3D failed, kept 2D fallback: {reason}");
                fallbacks += 1;
            }
        }
    }

    eprintln!(
        "[atlas] Done — {rendered} rendered, {fallbacks} fallbacks, {skipped} skipped. Output: {}",
        out_dir.display()
    );
    Ok(())
}
