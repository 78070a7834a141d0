use anyhow::{Context, Result};
use image::RgbImage;

use crate::display::Surface;
use crate::geometry::{self, BoundingBox, MAX_DIMENSION};
use crate::input::{self, ImageSource};
use crate::refine::{BrushSettings, Outcome, RefinementSession};
use crate::segmentation::{run_initial, SegmentationEngine, ITERATIONS};

/// Knobs for one [`segment`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOptions {
    pub brush: BrushSettings,
    pub iterations: u32,
    pub max_dimension: u32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            brush: BrushSettings::default(),
            iterations: ITERATIONS,
            max_dimension: MAX_DIMENSION,
        }
    }
}

pub struct SegmentOutput {
    /// Resized image with the box outlined
    pub boxed_preview: RgbImage,
    /// Resized image with the background blacked out
    pub segmented: RgbImage,
    /// How refinement ended, if it ran
    pub outcome: Option<Outcome>,
}

/// Load, resize and segment one image.
///
/// `box_spec` is `left,top,right,bottom` in original image coordinates, or
/// empty for the whole image. Passing a `surface` runs interactive
/// refinement on it after the first pass; the result of that session is
/// returned instead of the first pass.
pub fn segment<E: SegmentationEngine + ?Sized>(
    engine: &mut E,
    source: ImageSource,
    box_spec: &str,
    options: &SegmentOptions,
    surface: Option<&mut dyn Surface>,
) -> Result<SegmentOutput> {
    let image = input::load(source);
    let (image, scale) = geometry::normalize(image, options.max_dimension);
    let (width, height) = image.dimensions();

    let region = if box_spec.trim().is_empty() {
        BoundingBox::full_image(width, height)
    } else {
        let region: BoundingBox = box_spec.parse()?;
        region.to_resized(scale)
    };
    tracing::info!(
        "Segmenting {}x{} image (ratio {:.3}) with box {:?}",
        width,
        height,
        scale.ratio(),
        region
    );

    let pass = run_initial(engine, &image, region, options.iterations)
        .context("Initial segmentation failed")?;

    let Some(surface) = surface else {
        return Ok(SegmentOutput {
            boxed_preview: pass.boxed_preview,
            segmented: pass.segmented,
            outcome: None,
        });
    };

    let session = RefinementSession::new(
        &image,
        &pass.boxed_preview,
        pass.mask,
        pass.model,
        pass.segmented,
        options.brush,
        options.iterations,
    );
    let (segmented, outcome) = session.run(engine, surface)?;

    Ok(SegmentOutput {
        boxed_preview: pass.boxed_preview,
        segmented,
        outcome: Some(outcome),
    })
}
