use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::types::{LabelMask, ModelState, Seed, SegmentationEngine};
use crate::error::SegmentError;
use crate::geometry::BoundingBox;

/// Engine iterations per invocation
pub const ITERATIONS: u32 = 5;

/// Outline colour of the box on the preview
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline width of the box on the preview, centred on the box edge
pub const BOX_THICKNESS: i32 = 3;

/// Everything the first, box-seeded pass produces.
///
/// `mask` and `model` belong to the session and are handed on to refinement.
pub struct InitialPass {
    pub boxed_preview: RgbImage,
    pub segmented: RgbImage,
    pub mask: LabelMask,
    pub model: ModelState,
}

/// Segment `image` from scratch using `region` as the seed.
///
/// `region` is clamped to the image first; a box that ends up with no area
/// is rejected with [`SegmentError::InvalidRegion`] before the engine runs.
pub fn run_initial<E: SegmentationEngine + ?Sized>(
    engine: &mut E,
    image: &RgbImage,
    region: BoundingBox,
    iterations: u32,
) -> Result<InitialPass, SegmentError> {
    let (width, height) = image.dimensions();
    let clamped = region.clamp_to(width, height);
    if clamped.is_empty() {
        return Err(SegmentError::InvalidRegion {
            region,
            width,
            height,
        });
    }

    tracing::info!("Initial segmentation inside {:?}", clamped);

    let mut mask = LabelMask::new(width, height);
    let mut model = ModelState::new();
    engine.segment(image, &mut mask, Seed::Rect(clamped), &mut model, iterations)?;

    Ok(InitialPass {
        boxed_preview: draw_box(image, clamped),
        segmented: apply_foreground(image, &mask),
        mask,
        model,
    })
}

/// Re-run the engine from the current mask, keeping definite labels and
/// continuing from `model`. Returns the new segmented image.
pub fn run_refine<E: SegmentationEngine + ?Sized>(
    engine: &mut E,
    image: &RgbImage,
    mask: &mut LabelMask,
    model: &mut ModelState,
    iterations: u32,
) -> Result<RgbImage, SegmentError> {
    engine.segment(image, mask, Seed::Mask, model, iterations)?;
    Ok(apply_foreground(image, mask))
}

/// Copy of `image` with every non-foreground pixel set to black.
pub fn apply_foreground(image: &RgbImage, mask: &LabelMask) -> RgbImage {
    let foreground = mask.foreground();
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if foreground[[y as usize, x as usize]] {
            *image.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Copy of `image` with `region` outlined.
pub fn draw_box(image: &RgbImage, region: BoundingBox) -> RgbImage {
    let mut preview = image.clone();
    let half = BOX_THICKNESS / 2;
    for grow in -half..=half {
        let width = region.width() + 2 * grow;
        let height = region.height() + 2 * grow;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at(region.left - grow, region.top - grow).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(&mut preview, rect, BOX_COLOR);
    }
    preview
}
