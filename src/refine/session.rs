use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use super::state::{step, Action, BrushStroke, Event, Polarity, SessionState, DEFAULT_BRUSH_SIZE};
use crate::display::Surface;
use crate::segmentation::{run_refine, LabelMask, ModelState, SegmentationEngine};

/// Brush size and feedback colours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushSettings {
    pub size: u32,
    pub fg_color: Rgb<u8>,
    pub bg_color: Rgb<u8>,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_BRUSH_SIZE,
            fg_color: Rgb([0, 255, 0]),
            bg_color: Rgb([255, 0, 0]),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Space was pressed; the result is the image on screen
    Finished,
    /// The surface was closed; the result is the last engine pass, without
    /// unapplied brush feedback
    Cancelled,
}

/// Interactive refinement of one image.
///
/// Owns the label mask and colour models for the lifetime of the session.
pub struct RefinementSession<'a> {
    image: &'a RgbImage,
    boxed_preview: &'a RgbImage,
    mask: LabelMask,
    model: ModelState,
    state: SessionState,
    // Output of the most recent engine pass
    segmented: RgbImage,
    // `segmented` plus brush feedback painted since that pass
    display: RgbImage,
    brush: BrushSettings,
    iterations: u32,
}

impl<'a> RefinementSession<'a> {
    pub fn new(
        image: &'a RgbImage,
        boxed_preview: &'a RgbImage,
        mask: LabelMask,
        model: ModelState,
        segmented: RgbImage,
        brush: BrushSettings,
        iterations: u32,
    ) -> Self {
        Self {
            image,
            boxed_preview,
            mask,
            model,
            state: SessionState::new(brush.size),
            display: segmented.clone(),
            segmented,
            brush,
            iterations,
        }
    }

    #[cfg(test)]
    pub fn mask(&self) -> &LabelMask {
        &self.mask
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn display(&self) -> &RgbImage {
        &self.display
    }

    /// Present, poll, dispatch until the user finishes or closes the surface.
    pub fn run<E: SegmentationEngine + ?Sized>(
        mut self,
        engine: &mut E,
        surface: &mut dyn Surface,
    ) -> Result<(RgbImage, Outcome)> {
        tracing::info!("Refining: f=foreground, b=background, r=re-run, =/- brush size, space=done");

        loop {
            surface
                .present(self.boxed_preview, &self.display)
                .context("Failed to present frames")?;

            let events = surface.poll_events().context("Failed to poll events")?;
            for event in events {
                if let Some(outcome) = self.handle(engine, event)? {
                    tracing::info!("Refinement ended: {:?}", outcome);
                    let result = match outcome {
                        Outcome::Finished => self.display,
                        Outcome::Cancelled => self.segmented,
                    };
                    return Ok((result, outcome));
                }
            }
        }
    }

    /// Apply one event. Returns the outcome once the session is over.
    pub fn handle<E: SegmentationEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        event: Event,
    ) -> Result<Option<Outcome>> {
        let (next, action) = step(self.state, event);
        if next != self.state {
            tracing::debug!(
                "{:?}: {:?} -> {:?} (brush {})",
                event,
                self.state.phase(),
                next.phase(),
                next.brush_size
            );
        }
        self.state = next;

        match action {
            None => {}
            Some(Action::Stroke(stroke)) => self.apply_stroke(stroke),
            Some(Action::Refine) => self.refine(engine)?,
            Some(Action::Finish) => return Ok(Some(Outcome::Finished)),
            Some(Action::Cancel) => return Ok(Some(Outcome::Cancelled)),
        }
        Ok(None)
    }

    /// Pin the stroke's square in the mask and paint a dab on the display.
    fn apply_stroke(&mut self, stroke: BrushStroke) {
        let color = match stroke.polarity {
            Polarity::Foreground => self.brush.fg_color,
            Polarity::Background => self.brush.bg_color,
        };
        self.mask.fill(stroke.region(), stroke.polarity.label());
        draw_filled_circle_mut(&mut self.display, (stroke.x, stroke.y), stroke.radius as i32, color);
    }

    fn refine<E: SegmentationEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        let _span = tracing::debug_span!("refine").entered();
        tracing::info!("Re-running segmentation from mask");

        self.segmented = run_refine(
            engine,
            self.image,
            &mut self.mask,
            &mut self.model,
            self.iterations,
        )
        .context("Refinement pass failed")?;
        self.display = self.segmented.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;
    use crate::geometry::BoundingBox;
    use crate::segmentation::{run_initial, Label, ITERATIONS};
    use crate::testing::{ScriptedSurface, ThresholdEngine};

    const DARK: Rgb<u8> = Rgb([40, 40, 40]);

    fn dark_image() -> RgbImage {
        RgbImage::from_pixel(100, 100, DARK)
    }

    fn session<'a>(
        engine: &mut ThresholdEngine,
        image: &'a RgbImage,
        preview: &'a mut Option<RgbImage>,
    ) -> RefinementSession<'a> {
        let pass = run_initial(engine, image, BoundingBox::new(10, 10, 90, 90), ITERATIONS).unwrap();
        let preview = preview.insert(pass.boxed_preview);
        RefinementSession::new(
            image,
            preview,
            pass.mask,
            pass.model,
            pass.segmented,
            BrushSettings::default(),
            ITERATIONS,
        )
    }

    #[test]
    fn stroke_then_refine_then_space() {
        let image = dark_image();
        let mut engine = ThresholdEngine::default();
        let mut preview = None;
        let session = session(&mut engine, &image, &mut preview);
        assert!(session.display().pixels().all(|p| p.0 == [0, 0, 0]));

        let mut surface = ScriptedSurface::new(vec![
            vec![Event::KeyPress('f')],
            vec![Event::PointerDown { x: 50, y: 50 }],
            vec![Event::PointerUp],
            vec![Event::KeyPress('r')],
            vec![Event::KeyPress(' ')],
        ]);
        let (result, outcome) = session.run(&mut engine, &mut surface).unwrap();
        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(engine.calls, 2);

        // The frame shown right after the click has the circular dab; the
        // corner of the square is pinned in the mask but not painted.
        let after_click = &surface.live_frames[2];
        assert_eq!(*after_click.get_pixel(50, 50), BrushSettings::default().fg_color);
        assert_eq!(after_click.get_pixel(36, 36).0, [0, 0, 0]);

        // After refinement the whole square is foreground.
        for (x, y, pixel) in result.enumerate_pixels() {
            let inside = (35..65).contains(&x) && (35..65).contains(&y);
            assert_eq!(*pixel, if inside { DARK } else { Rgb([0, 0, 0]) }, "({}, {})", x, y);
        }
    }

    #[test]
    fn background_stroke_pins_background() {
        let image = RgbImage::from_pixel(100, 100, Rgb([200, 200, 200]));
        let mut engine = ThresholdEngine::default();
        let mut preview = None;
        let mut session = session(&mut engine, &image, &mut preview);

        for event in [
            Event::KeyPress('b'),
            Event::KeyPress('-'),
            Event::PointerDown { x: 30, y: 30 },
            Event::PointerMove { x: 31, y: 30 },
        ] {
            assert_eq!(session.handle(&mut engine, event).unwrap(), None);
        }

        let radius = BrushSettings::default().size - 2;
        assert_eq!(session.state().brush_size, radius);
        assert_eq!(session.mask().get(30, 30), Label::Background);
        assert_eq!(*session.display().get_pixel(30, 30), BrushSettings::default().bg_color);

        session.handle(&mut engine, Event::KeyPress('r')).unwrap();
        assert_eq!(session.mask().get(30, 30), Label::Background);
        assert_eq!(session.mask().get(50, 50), Label::ProbableForeground);
        assert_eq!(session.display().get_pixel(30, 30).0, [0, 0, 0]);
        assert_eq!(*session.display().get_pixel(50, 50), Rgb([200, 200, 200]));
    }

    #[test]
    fn strokes_at_the_edge_are_clipped() {
        let image = dark_image();
        let mut engine = ThresholdEngine::default();
        let mut preview = None;
        let mut session = session(&mut engine, &image, &mut preview);

        let events = [
            Event::KeyPress('f'),
            Event::PointerDown { x: 0, y: 0 },
            Event::PointerMove { x: 99, y: 0 },
            Event::PointerMove { x: -20, y: 120 },
            Event::KeyPress('b'),
            Event::PointerMove { x: 99, y: 99 },
            Event::PointerUp,
        ];
        for event in events {
            session.handle(&mut engine, event).unwrap();
        }

        assert_eq!(session.mask().dimensions(), (100, 100));
        assert_eq!(session.mask().get(0, 0), Label::Foreground);
        assert_eq!(session.mask().get(99, 0), Label::Foreground);
        assert_eq!(session.mask().get(99, 99), Label::Background);
        for label in session.mask().labels().iter() {
            assert!(Label::try_from(*label as u8).is_ok());
        }
    }

    #[test]
    fn close_returns_last_engine_result() {
        let image = dark_image();
        let mut engine = ThresholdEngine::default();
        let mut preview = None;
        let session = session(&mut engine, &image, &mut preview);

        let mut surface = ScriptedSurface::new(vec![vec![
            Event::KeyPress('f'),
            Event::PointerDown { x: 50, y: 50 },
            Event::Close,
        ]]);
        let (result, outcome) = session.run(&mut engine, &mut surface).unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(result.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn engine_failure_ends_the_session() {
        let image = dark_image();
        let mut engine = ThresholdEngine::default();
        let mut preview = None;
        let session = session(&mut engine, &image, &mut preview);
        engine.fail = true;

        let mut surface = ScriptedSurface::new(vec![vec![Event::KeyPress('r')]]);
        let err = session.run(&mut engine, &mut surface).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SegmentError>(),
            Some(SegmentError::EngineFailure(_))
        ));
    }
}
