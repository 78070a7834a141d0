use std::str::FromStr;

use image::{imageops, RgbImage};

use crate::error::SegmentError;

/// Largest side an image may have before it is scaled down.
pub const MAX_DIMENSION: u32 = 800;

/// Axis-aligned box in pixel coordinates, `right` and `bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Box used when the caller supplies none: everything but a one pixel
    /// border, or the whole image when it is too small to leave one.
    pub fn full_image(width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        let inset = Self::new(1, 1, w - 1, h - 1);
        if inset.is_empty() {
            Self::new(0, 0, w, h)
        } else {
            inset
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Intersect with the `width` x `height` image area.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        Self::new(
            self.left.clamp(0, w),
            self.top.clamp(0, h),
            self.right.clamp(0, w),
            self.bottom.clamp(0, h),
        )
    }

    /// Map a box from original-image coordinates into resized coordinates.
    pub fn to_resized(&self, scale: Scale) -> Self {
        Self::new(
            scale.to_resized(self.left),
            scale.to_resized(self.top),
            scale.to_resized(self.right),
            scale.to_resized(self.bottom),
        )
    }

    /// Map a box from resized coordinates back to the original image.
    #[cfg(test)]
    pub fn to_original(&self, scale: Scale) -> Self {
        Self::new(
            scale.to_original(self.left),
            scale.to_original(self.top),
            scale.to_original(self.right),
            scale.to_original(self.bottom),
        )
    }
}

impl FromStr for BoundingBox {
    type Err = SegmentError;

    /// Parse `left,top,right,bottom`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coords = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SegmentError::InvalidBox(s.to_string()))?;

        match coords.as_slice() {
            &[left, top, right, bottom] => Ok(Self::new(left, top, right, bottom)),
            _ => Err(SegmentError::InvalidBox(s.to_string())),
        }
    }
}

/// Exact resize ratio `resized / original`, kept as a fraction so that
/// coordinate mapping truncates the same way every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    resized: u32,
    original: u32,
}

impl Scale {
    pub const IDENTITY: Scale = Scale {
        resized: 1,
        original: 1,
    };

    pub fn new(resized: u32, original: u32) -> Self {
        if resized == 0 || original == 0 {
            return Self::IDENTITY;
        }
        Self { resized, original }
    }

    pub fn ratio(&self) -> f64 {
        self.resized as f64 / self.original as f64
    }

    pub fn to_resized(&self, coord: i32) -> i32 {
        (coord as i64 * self.resized as i64).div_euclid(self.original as i64) as i32
    }

    #[cfg(test)]
    pub fn to_original(&self, coord: i32) -> i32 {
        (coord as i64 * self.original as i64).div_euclid(self.resized as i64) as i32
    }
}

/// Scale `image` down so its larger side is at most `max_dimension`.
///
/// Returns the image unchanged with [`Scale::IDENTITY`] when it already fits.
pub fn normalize(image: RgbImage, max_dimension: u32) -> (RgbImage, Scale) {
    let (width, height) = image.dimensions();
    let larger = width.max(height);
    if larger <= max_dimension || max_dimension == 0 {
        return (image, Scale::IDENTITY);
    }

    let _span = tracing::debug_span!("normalize").entered();

    let shrink = |side: u32| ((side as u64 * max_dimension as u64 / larger as u64) as u32).max(1);
    let (new_width, new_height) = if width >= height {
        (max_dimension, shrink(height))
    } else {
        (shrink(width), max_dimension)
    };

    tracing::info!(
        "Resizing {}x{} -> {}x{}",
        width,
        height,
        new_width,
        new_height
    );

    let resized = imageops::resize(
        &image,
        new_width,
        new_height,
        imageops::FilterType::Triangle,
    );

    (resized, Scale::new(max_dimension, larger))
}
