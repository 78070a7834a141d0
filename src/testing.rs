//! Deterministic doubles for the engine and display seams.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::display::Surface;
use crate::error::SegmentError;
use crate::refine::Event;
use crate::segmentation::types::Seed;
use crate::segmentation::{Label, LabelMask, ModelState, SegmentationEngine};

/// Labels every non-pinned pixel by brightness: probable foreground at or
/// above 128, probable background below.
#[derive(Default)]
pub struct ThresholdEngine {
    pub calls: usize,
    pub last_seed: Option<Seed>,
    pub last_iterations: u32,
    pub last_mask: Option<LabelMask>,
    pub fail: bool,
}

impl SegmentationEngine for ThresholdEngine {
    fn segment(
        &mut self,
        image: &RgbImage,
        mask: &mut LabelMask,
        seed: Seed,
        model: &mut ModelState,
        iterations: u32,
    ) -> Result<(), SegmentError> {
        if self.fail {
            return Err(SegmentError::EngineFailure("scripted failure".to_string()));
        }
        self.calls += 1;
        self.last_seed = Some(seed);
        self.last_iterations = iterations;

        if let Seed::Rect(rect) = seed {
            mask.labels_mut().fill(Label::Background);
            mask.fill(rect, Label::ProbableForeground);
        }

        for (x, y, pixel) in image.enumerate_pixels() {
            if mask.get(x, y).is_definite() {
                continue;
            }
            let brightness = (pixel[0] as u32 + pixel[1] as u32 + pixel[2] as u32) / 3;
            let label = if brightness >= 128 {
                Label::ProbableForeground
            } else {
                Label::ProbableBackground
            };
            mask.set(x, y, label);
        }

        model.foreground[0] = 1.0;
        model.background[0] = 1.0;
        self.last_mask = Some(mask.clone());
        Ok(())
    }
}

/// Replays one batch of events per poll and records every live frame.
pub struct ScriptedSurface {
    ticks: VecDeque<Vec<Event>>,
    pub live_frames: Vec<RgbImage>,
}

impl ScriptedSurface {
    pub fn new(ticks: Vec<Vec<Event>>) -> Self {
        Self {
            ticks: ticks.into(),
            live_frames: Vec::new(),
        }
    }
}

impl Surface for ScriptedSurface {
    fn present(&mut self, _original: &RgbImage, live: &RgbImage) -> Result<()> {
        self.live_frames.push(live.clone());
        Ok(())
    }

    fn poll_events(&mut self) -> Result<Vec<Event>> {
        self.ticks
            .pop_front()
            .ok_or_else(|| anyhow!("event script exhausted"))
    }
}
