//! Shared high-dynamic-range environment lighting asset.
//!
//! One HDR panorama lights every region in a run. The file lives at a fixed
//! cache path and is fetched from a fixed URL the first time any region
//! reaches the 3D stage; after that it is read-only, process-wide state.

use std::fs;
use std::io::Read;
use std::path::Path;

use glam::Vec3;

use crate::error::{ReliefError, Result};

/// Fixed remote source of the lighting panorama.
pub const ENV_URL: &str =
    "https://dl.polyhaven.org/file/ph-assets/HDRIs/hdr/2k/kloppenheim_06_2k.hdr";

/// Equirectangular radiance map, linear RGB.
pub struct EnvironmentMap {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl EnvironmentMap {
    /// Load the panorama from `cache_path`, downloading it from `url` first
    /// if the file does not exist yet (check-then-download; the run is
    /// single-threaded, so no locking is required).
    pub fn load_or_fetch(cache_path: &Path, url: &str) -> Result<Self> {
        if !cache_path.exists() {
            fetch_to(cache_path, url)?;
        }
        Self::load(cache_path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)?.into_rgb32f();
        let (width, height) = (img.width(), img.height());
        let pixels = img.pixels().map(|p| p.0).collect();
        Ok(Self { width, height, pixels })
    }

    /// Uniform radiance map, for tests and offline runs.
    pub fn constant(radiance: [f32; 3]) -> Self {
        Self { width: 2, height: 1, pixels: vec![radiance; 2] }
    }

    /// Sample radiance toward `dir` (z up), rotating the panorama by
    /// `rotation_deg` about the vertical axis.
    pub fn sample(&self, dir: Vec3, rotation_deg: f32) -> [f32; 3] {
        let d = dir.normalize_or_zero();
        if d == Vec3::ZERO {
            return [0.0; 3];
        }
        let azimuth = d.x.atan2(d.y) + rotation_deg.to_radians();
        let u = (azimuth / std::f32::consts::TAU).rem_euclid(1.0);
        let v = (d.z.clamp(-1.0, 1.0).acos() / std::f32::consts::PI).clamp(0.0, 1.0);

        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }
}

fn fetch_to(cache_path: &Path, url: &str) -> Result<()> {
    let fetch_err = |reason: String| ReliefError::AssetFetch {
        url: url.to_string(),
        reason,
    };

    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ReliefError::io(parent, e))?;
    }

    let response = ureq::get(url)
        .call()
        .map_err(|e| fetch_err(e.to_string()))?;

    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| fetch_err(e.to_string()))?;
    if bytes.is_empty() {
        return Err(fetch_err("empty response body".into()));
    }

    fs::write(cache_path, &bytes).map_err(|e| ReliefError::io(cache_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_map_samples_everywhere() {
        let env = EnvironmentMap::constant([0.5, 0.25, 0.125]);
        for dir in [Vec3::Z, Vec3::NEG_Z, Vec3::X, Vec3::new(0.3, -0.7, 0.2)] {
            assert_eq!(env.sample(dir, 0.0), [0.5, 0.25, 0.125]);
        }
    }

    #[test]
    fn zero_direction_is_black() {
        let env = EnvironmentMap::constant([1.0; 3]);
        assert_eq!(env.sample(Vec3::ZERO, 0.0), [0.0; 3]);
    }

    #[test]
    fn sample_indices_stay_in_bounds() {
        let env = EnvironmentMap {
            width: 4,
            height: 2,
            pixels: vec![[1.0; 3]; 8],
        };
        for rot in [0.0, 90.0, 359.0, -720.0] {
            for dir in [Vec3::Z, Vec3::NEG_Z, Vec3::new(1.0, 1.0, -1.0)] {
                let _ = env.sample(dir, rot); // must not index out of range
            }
        }
    }
}
