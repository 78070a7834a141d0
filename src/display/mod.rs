mod window;

pub use window::WindowSurface;

use anyhow::Result;
use image::RgbImage;

use crate::refine::Event;

/// Trait for interactive display surfaces
pub trait Surface {
    /// Show the boxed original and the live segmentation side by side
    fn present(&mut self, original: &RgbImage, live: &RgbImage) -> Result<()>;

    /// Collect input gathered since the last call, in image coordinates
    fn poll_events(&mut self) -> Result<Vec<Event>>;
}
