use thiserror::Error;

use crate::geometry::BoundingBox;

/// Failures that abort a segmentation call.
///
/// Decode failures are absent on purpose: the loader recovers from them with
/// a blank placeholder.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// The box is outside the image or has no area once clamped.
    #[error("invalid region {region:?} for a {width}x{height} image")]
    InvalidRegion {
        region: BoundingBox,
        width: u32,
        height: u32,
    },

    /// The box string could not be parsed as `left,top,right,bottom`.
    #[error("invalid box {0:?}: expected `left,top,right,bottom`")]
    InvalidBox(String),

    /// The segmentation engine itself failed.
    #[error("segmentation engine failed: {0}")]
    EngineFailure(String),
}
