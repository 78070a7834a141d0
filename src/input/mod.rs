use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Side of the blank canvas substituted for an image that fails to decode.
pub const PLACEHOLDER_SIZE: u32 = 224;

/// Where an image comes from
pub enum ImageSource {
    /// A file on disk
    Path(PathBuf),
    /// Encoded bytes in any format the `image` crate understands
    Bytes(Vec<u8>),
    /// An already decoded image, used as-is
    Pixels(RgbImage),
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        ImageSource::Pixels(image)
    }
}

/// Load an image as 3-channel RGB.
///
/// Never fails: grayscale is broadcast to three channels, alpha is dropped,
/// and anything that cannot be decoded becomes a black
/// `PLACEHOLDER_SIZE` x `PLACEHOLDER_SIZE` canvas with a warning logged.
pub fn load(source: ImageSource) -> RgbImage {
    let decoded = match source {
        ImageSource::Pixels(image) => return image,
        ImageSource::Path(path) => decode_file(&path)
            .with_context(|| format!("Failed to read image {}", path.display())),
        ImageSource::Bytes(bytes) => decode_bytes(&bytes).context("Failed to decode image bytes"),
    };

    match decoded {
        Ok(image) => {
            tracing::info!(
                "Loaded {}x{} image ({:?})",
                image.width(),
                image.height(),
                image.color()
            );
            image.to_rgb8()
        }
        Err(e) => {
            tracing::warn!("{:#}; using blank placeholder", e);
            RgbImage::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
        }
    }
}

fn decode_file(path: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}

fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(image)
}
