use super::Surface;
use anyhow::{anyhow, Result};
use image::RgbImage;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::refine::Event;

const ORIGINAL_TITLE: &str = "original-with-box";
const LIVE_TITLE: &str = "live-segmentation";

// Roughly a 1ms wait per frame
const TARGET_FPS: usize = 1000;

/// Two `minifb` windows; input is read from the live one only.
///
/// Windows open on the first `present`, sized to the image.
pub struct WindowSurface {
    original: Option<Window>,
    live: Option<Window>,
    original_buffer: Vec<u32>,
    live_buffer: Vec<u32>,
    button_down: bool,
    pointer: Option<(i32, i32)>,
}

impl WindowSurface {
    pub fn new() -> Self {
        Self {
            original: None,
            live: None,
            original_buffer: Vec::new(),
            live_buffer: Vec::new(),
            button_down: false,
            pointer: None,
        }
    }

    fn open(title: &str, width: u32, height: u32) -> Result<Window> {
        tracing::info!("Opening window '{}' ({}x{})", title, width, height);
        let mut window = Window::new(title, width as usize, height as usize, WindowOptions::default())
            .map_err(|e| anyhow!("Failed to open window '{}': {}", title, e))?;
        window.set_target_fps(TARGET_FPS);
        Ok(window)
    }

    fn pointer_events(&mut self, live: &Window, events: &mut Vec<Event>) {
        let pointer = live
            .get_mouse_pos(MouseMode::Discard)
            .map(|(x, y)| (x as i32, y as i32));
        let down = live.get_mouse_down(MouseButton::Left);

        match (self.button_down, down) {
            (false, true) => {
                // A press outside the window is ignored until the pointer enters.
                if let Some((x, y)) = pointer {
                    events.push(Event::PointerDown { x, y });
                    self.button_down = true;
                }
            }
            (true, false) => {
                events.push(Event::PointerUp);
                self.button_down = false;
            }
            _ => {
                if let Some((x, y)) = pointer {
                    if self.pointer != pointer {
                        events.push(Event::PointerMove { x, y });
                    }
                }
            }
        }
        self.pointer = pointer;
    }
}

impl Default for WindowSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Pack RGB pixels as `0x00RRGGBB`
fn to_buffer(image: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        image
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}

fn key_char(key: Key) -> Option<char> {
    match key {
        Key::F => Some('f'),
        Key::B => Some('b'),
        Key::R => Some('r'),
        Key::Equal | Key::NumPadPlus => Some('='),
        Key::Minus | Key::NumPadMinus => Some('-'),
        Key::Space => Some(' '),
        _ => None,
    }
}

impl Surface for WindowSurface {
    fn present(&mut self, original: &RgbImage, live: &RgbImage) -> Result<()> {
        if self.live.is_none() {
            self.original = Some(Self::open(ORIGINAL_TITLE, original.width(), original.height())?);
            self.live = Some(Self::open(LIVE_TITLE, live.width(), live.height())?);
        }

        // The reference window may be closed without ending the session.
        if let Some(window) = self.original.as_mut().filter(|w| w.is_open()) {
            to_buffer(original, &mut self.original_buffer);
            window
                .update_with_buffer(
                    &self.original_buffer,
                    original.width() as usize,
                    original.height() as usize,
                )
                .map_err(|e| anyhow!("Failed to update '{}': {}", ORIGINAL_TITLE, e))?;
        }

        if let Some(window) = self.live.as_mut().filter(|w| w.is_open()) {
            to_buffer(live, &mut self.live_buffer);
            window
                .update_with_buffer(&self.live_buffer, live.width() as usize, live.height() as usize)
                .map_err(|e| anyhow!("Failed to update '{}': {}", LIVE_TITLE, e))?;
        }

        Ok(())
    }

    fn poll_events(&mut self) -> Result<Vec<Event>> {
        let Some(live) = self.live.take() else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        if !live.is_open() {
            events.push(Event::Close);
        } else {
            events.extend(
                live.get_keys_pressed(KeyRepeat::No)
                    .into_iter()
                    .filter_map(key_char)
                    .map(Event::KeyPress),
            );
            self.pointer_events(&live, &mut events);
        }

        self.live = Some(live);
        Ok(events)
    }
}
