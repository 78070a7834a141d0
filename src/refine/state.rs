use crate::geometry::BoundingBox;
use crate::segmentation::Label;

pub const DEFAULT_BRUSH_SIZE: u32 = 15;
pub const MIN_BRUSH_SIZE: u32 = 1;
pub const BRUSH_STEP: u32 = 2;

/// Which label a stroke pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Foreground,
    Background,
}

impl Polarity {
    pub fn label(self) -> Label {
        match self {
            Polarity::Foreground => Label::Foreground,
            Polarity::Background => Label::Background,
        }
    }
}

/// Input from the live segmentation surface, in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PointerDown { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp,
    KeyPress(char),
    /// The live surface was closed
    Close,
}

/// One brush dab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushStroke {
    pub x: i32,
    pub y: i32,
    pub radius: u32,
    pub polarity: Polarity,
}

impl BrushStroke {
    /// Square of side `2 * radius` centred on the pointer. This is the area
    /// written to the mask; the on-screen dab is a circle of the same radius.
    pub fn region(&self) -> BoundingBox {
        let r = self.radius as i32;
        BoundingBox::new(self.x - r, self.y - r, self.x + r, self.y + r)
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Stroke(BrushStroke),
    Refine,
    Finish,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PaintingForeground,
    PaintingBackground,
}

/// Brush mode, button state and brush size of a refinement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub mode: Option<Polarity>,
    pub drawing: bool,
    pub brush_size: u32,
}

impl SessionState {
    pub fn new(brush_size: u32) -> Self {
        Self {
            mode: None,
            drawing: false,
            brush_size: brush_size.max(MIN_BRUSH_SIZE),
        }
    }

    pub fn phase(&self) -> Phase {
        match (self.drawing, self.mode) {
            (true, Some(Polarity::Foreground)) => Phase::PaintingForeground,
            (true, Some(Polarity::Background)) => Phase::PaintingBackground,
            _ => Phase::Idle,
        }
    }

    fn stroke_at(&self, x: i32, y: i32) -> Option<Action> {
        self.mode.map(|polarity| {
            Action::Stroke(BrushStroke {
                x,
                y,
                radius: self.brush_size,
                polarity,
            })
        })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_BRUSH_SIZE)
    }
}

/// Advance the session by one event.
///
/// Keys: `f`/`b` pick the brush polarity, `r` clears it and asks for a
/// refinement pass, `=`/`-` grow or shrink the brush, space finishes.
pub fn step(state: SessionState, event: Event) -> (SessionState, Option<Action>) {
    let mut next = state;
    let action = match event {
        Event::PointerDown { x, y } => {
            next.drawing = true;
            next.stroke_at(x, y)
        }
        Event::PointerMove { x, y } if next.drawing => next.stroke_at(x, y),
        Event::PointerMove { .. } => None,
        Event::PointerUp => {
            next.drawing = false;
            None
        }
        Event::KeyPress('f') => {
            next.mode = Some(Polarity::Foreground);
            None
        }
        Event::KeyPress('b') => {
            next.mode = Some(Polarity::Background);
            None
        }
        Event::KeyPress('r') => {
            next.mode = None;
            Some(Action::Refine)
        }
        Event::KeyPress('=') => {
            next.brush_size = next.brush_size.saturating_add(BRUSH_STEP);
            None
        }
        Event::KeyPress('-') => {
            next.brush_size = next
                .brush_size
                .saturating_sub(BRUSH_STEP)
                .max(MIN_BRUSH_SIZE);
            None
        }
        Event::KeyPress(' ') => Some(Action::Finish),
        Event::KeyPress(_) => None,
        Event::Close => Some(Action::Cancel),
    };
    (next, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(events: &[Event]) -> (SessionState, Vec<Action>) {
        events
            .iter()
            .fold((SessionState::default(), Vec::new()), |(state, mut actions), &e| {
                let (next, action) = step(state, e);
                actions.extend(action);
                (next, actions)
            })
    }

    #[test]
    fn mode_keys_are_exclusive_and_idempotent() {
        let (state, actions) = run(&[Event::KeyPress('f'), Event::KeyPress('f')]);
        assert_eq!(state.mode, Some(Polarity::Foreground));
        assert!(actions.is_empty());

        let (state, _) = run(&[Event::KeyPress('f'), Event::KeyPress('b')]);
        assert_eq!(state.mode, Some(Polarity::Background));
    }

    #[test]
    fn pointer_down_paints_with_current_mode() {
        let (state, actions) = run(&[Event::KeyPress('b'), Event::PointerDown { x: 4, y: 9 }]);
        assert_eq!(state.phase(), Phase::PaintingBackground);
        assert_eq!(
            actions,
            vec![Action::Stroke(BrushStroke {
                x: 4,
                y: 9,
                radius: DEFAULT_BRUSH_SIZE,
                polarity: Polarity::Background,
            })]
        );
    }

    #[test]
    fn pointer_down_without_mode_only_starts_drawing() {
        let (state, actions) = run(&[
            Event::PointerDown { x: 1, y: 1 },
            Event::PointerMove { x: 2, y: 2 },
        ]);
        assert!(state.drawing);
        assert_eq!(state.phase(), Phase::Idle);
        assert!(actions.is_empty());
    }

    #[test]
    fn moves_paint_only_while_button_is_held() {
        let (state, actions) = run(&[
            Event::KeyPress('f'),
            Event::PointerMove { x: 0, y: 0 },
            Event::PointerDown { x: 1, y: 1 },
            Event::PointerMove { x: 2, y: 2 },
            Event::PointerUp,
            Event::PointerMove { x: 3, y: 3 },
        ]);
        assert!(!state.drawing);
        let painted: Vec<_> = actions
            .iter()
            .map(|a| match a {
                Action::Stroke(s) => (s.x, s.y),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(painted, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn mode_can_change_mid_drag() {
        let (_, actions) = run(&[
            Event::KeyPress('f'),
            Event::PointerDown { x: 1, y: 1 },
            Event::KeyPress('b'),
            Event::PointerMove { x: 2, y: 2 },
        ]);
        assert!(matches!(
            actions.last(),
            Some(Action::Stroke(BrushStroke { polarity: Polarity::Background, .. }))
        ));
    }

    #[test]
    fn refine_clears_mode() {
        let (state, actions) = run(&[Event::KeyPress('f'), Event::KeyPress('r')]);
        assert_eq!(state.mode, None);
        assert_eq!(actions, vec![Action::Refine]);
    }

    #[test]
    fn brush_size_is_clamped_at_minimum() {
        let (state, _) = run(&[Event::KeyPress('=')]);
        assert_eq!(state.brush_size, DEFAULT_BRUSH_SIZE + BRUSH_STEP);

        let shrink = vec![Event::KeyPress('-'); 20];
        let (state, _) = run(&shrink);
        assert_eq!(state.brush_size, MIN_BRUSH_SIZE);
        assert_eq!(SessionState::new(0).brush_size, MIN_BRUSH_SIZE);
    }

    #[test]
    fn space_finishes_and_close_cancels() {
        assert_eq!(run(&[Event::KeyPress(' ')]).1, vec![Action::Finish]);
        assert_eq!(run(&[Event::Close]).1, vec![Action::Cancel]);
        assert!(run(&[Event::KeyPress('x')]).1.is_empty());
    }

    #[test]
    fn stroke_region_is_a_square_around_the_pointer() {
        let stroke = BrushStroke {
            x: 10,
            y: 20,
            radius: 3,
            polarity: Polarity::Foreground,
        };
        assert_eq!(stroke.region(), BoundingBox::new(7, 17, 13, 23));
    }
}
