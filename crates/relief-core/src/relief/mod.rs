//! 2D relief composition: band fills, Tanaka contours, decorations.

pub mod compose;
pub mod contour;
pub mod font;

pub use compose::{compose_relief, ReliefArtifact, ReliefParams, ReliefScene};
