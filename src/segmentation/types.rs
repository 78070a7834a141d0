use image::RgbImage;
use ndarray::{s, Array1, Array2};

use crate::error::SegmentError;
use crate::geometry::BoundingBox;

/// Per-pixel classification.
///
/// Definite labels are pinned by the user (or by the box); probable labels
/// are re-estimated by the engine on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Label {
    #[default]
    Background = 0,
    Foreground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl Label {
    pub fn is_foreground(self) -> bool {
        matches!(self, Label::Foreground | Label::ProbableForeground)
    }

    pub fn is_definite(self) -> bool {
        matches!(self, Label::Background | Label::Foreground)
    }
}

impl TryFrom<u8> for Label {
    type Error = SegmentError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Background),
            1 => Ok(Label::Foreground),
            2 => Ok(Label::ProbableBackground),
            3 => Ok(Label::ProbableForeground),
            other => Err(SegmentError::EngineFailure(format!(
                "mask value {} is not a label",
                other
            ))),
        }
    }
}

/// Label per pixel, indexed `[[y, x]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMask {
    labels: Array2<Label>,
}

impl LabelMask {
    /// All-background mask for a `width` x `height` image
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            labels: Array2::from_elem((height as usize, width as usize), Label::Background),
        }
    }

    pub fn width(&self) -> u32 {
        self.labels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.labels.nrows() as u32
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[cfg(test)]
    pub fn get(&self, x: u32, y: u32) -> Label {
        self.labels[[y as usize, x as usize]]
    }

    #[cfg(test)]
    pub fn set(&mut self, x: u32, y: u32, label: Label) {
        self.labels[[y as usize, x as usize]] = label;
    }

    pub fn labels(&self) -> &Array2<Label> {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut Array2<Label> {
        &mut self.labels
    }

    /// Overwrite `region` (clipped to the mask) with `label`.
    pub fn fill(&mut self, region: BoundingBox, label: Label) {
        let region = region.clamp_to(self.width(), self.height());
        if region.is_empty() {
            return;
        }
        self.labels
            .slice_mut(s![
                region.top as usize..region.bottom as usize,
                region.left as usize..region.right as usize
            ])
            .fill(label);
    }

    /// Binary foreground mask: everything not labelled (probable) background.
    pub fn foreground(&self) -> Array2<bool> {
        self.labels.mapv(Label::is_foreground)
    }

    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}

/// Number of GMM components per class
pub const COMPONENTS: usize = 5;

/// Parameters per component: weight, 3 means, 3x3 covariance
pub const COMPONENT_PARAMS: usize = 1 + 3 + 9;

/// Length of each colour model array
pub const MODEL_LEN: usize = COMPONENTS * COMPONENT_PARAMS;

/// Background and foreground colour models, carried across engine runs so
/// refinement continues from where the previous pass left off.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub background: Array1<f64>,
    pub foreground: Array1<f64>,
}

impl ModelState {
    pub fn new() -> Self {
        Self {
            background: Array1::zeros(MODEL_LEN),
            foreground: Array1::zeros(MODEL_LEN),
        }
    }
}

impl Default for ModelState {
    fn default() -> Self {
        Self::new()
    }
}

/// How the engine initialises its labelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Everything outside the box is background, inside is probable foreground
    Rect(BoundingBox),
    /// Keep the current mask and only re-estimate probable labels
    Mask,
}

/// Trait for segmentation engines
/// The invoker only depends on this; `GrabCut` is the built-in backend
pub trait SegmentationEngine {
    /// Run `iterations` rounds of segmentation over `image`
    ///
    /// Overwrites probable labels in `mask` and never touches definite ones,
    /// except that `Seed::Rect` first re-seeds the whole mask from the box.
    /// `model` is read and updated in place.
    fn segment(
        &mut self,
        image: &RgbImage,
        mask: &mut LabelMask,
        seed: Seed,
        model: &mut ModelState,
        iterations: u32,
    ) -> Result<(), SegmentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mask_is_background() {
        let mask = LabelMask::new(4, 3);
        assert_eq!(mask.dimensions(), (4, 3));
        assert_eq!(mask.count(Label::Background), 12);
    }

    #[test]
    fn fill_is_clipped() {
        let mut mask = LabelMask::new(10, 10);
        mask.fill(BoundingBox::new(-5, 8, 3, 20), Label::Foreground);
        assert_eq!(mask.count(Label::Foreground), 3 * 2);
        assert_eq!(mask.get(0, 9), Label::Foreground);
        assert_eq!(mask.get(3, 9), Label::Background);
    }

    #[test]
    fn foreground_counts_definite_and_probable() {
        let mut mask = LabelMask::new(4, 1);
        mask.set(0, 0, Label::Background);
        mask.set(1, 0, Label::Foreground);
        mask.set(2, 0, Label::ProbableBackground);
        mask.set(3, 0, Label::ProbableForeground);
        let fg = mask.foreground();
        assert_eq!(fg.row(0).to_vec(), vec![false, true, false, true]);
    }

    #[test]
    fn label_values_round_trip() {
        for value in 0u8..4 {
            assert_eq!(Label::try_from(value).unwrap() as u8, value);
        }
        assert!(Label::try_from(4).is_err());
    }
}
