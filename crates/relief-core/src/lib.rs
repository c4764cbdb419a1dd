//! Per-region adaptive terrain classification and layered relief rendering.
//!
//! The pipeline for one region: elevation sample → classification breaks →
//! hypsometric palette → composed 2D relief artifact → 3D extrusion attempt
//! with a guaranteed 2D fallback. Everything here is region-local; the only
//! process-wide state is the cached environment-lighting asset.

pub mod breaks;
pub mod elevation;
pub mod error;
pub mod palette;
pub mod relief;
pub mod render3d;

pub use breaks::{compute_breaks, BreakSet};
pub use elevation::ElevationField;
pub use error::{ReliefError, Result};
pub use palette::{build_palette, Palette, Rgb};
pub use relief::{compose_relief, ReliefArtifact, ReliefParams};
pub use render3d::{ExtrusionRenderer, RenderParams, Renderer3d};
