//! Error taxonomy for the relief pipeline.
//!
//! Only genuinely unrecoverable or stage-aborting conditions are errors:
//! degenerate elevation ranges and too-small color ramps are handled inside
//! their algorithms and never surface here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReliefError {
    /// Elevation sample is empty or entirely no-data; the region is skipped.
    #[error("no defined elevation data in sample")]
    NoData,

    /// 2D composition could not produce a pixmap (degenerate canvas size).
    #[error("relief composition failed: {0}")]
    Compose(String),

    /// 3D extrusion or high-quality render failed; the caller degrades to
    /// the 2D artifact.
    #[error("3D render failed: {0}")]
    Render(String),

    /// The shared lighting asset could not be fetched or decoded.
    #[error("lighting asset unavailable ({url}): {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image encode/decode error: {0}")]
    Image(#[from] image::ImageError),
}

impl ReliefError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, ReliefError>;
