//! On-screen window backed by minifb
//!
//! minifb exposes mouse and keyboard as polled state. `PointerTracker`
//! diffs consecutive polls into the edge-triggered events the session
//! consumes. Window pixels map 1:1 to image pixels.

use image::RgbImage;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use tracing::info;

use crate::error::Error;
use crate::geometry::Point;
use crate::input::PointerEvent;
use crate::render::to_display_buffer;
use crate::session::{DisplaySurface, SessionEvent};

/// Turns sampled pointer state into press/move/release/leave events
#[derive(Debug, Default)]
pub struct PointerTracker {
    position: Option<Point>,
    button_down: bool,
}

impl PointerTracker {
    /// Feed the latest sample. Only the newest position is reported; a move
    /// comes before any button edge seen in the same sample.
    pub fn update(&mut self, position: Option<Point>, button_down: bool) -> Vec<PointerEvent> {
        let mut events = Vec::new();

        match position {
            Some(point) => {
                if self.position != Some(point) {
                    events.push(PointerEvent::Move(point));
                }
                if button_down && !self.button_down {
                    events.push(PointerEvent::Press(point));
                } else if !button_down && self.button_down {
                    events.push(PointerEvent::Release);
                }
            }
            None => {
                if self.position.is_some() {
                    events.push(PointerEvent::Leave);
                }
            }
        }

        self.position = position;
        self.button_down = button_down;
        events
    }
}

pub struct WindowSurface {
    window: Window,
    width: usize,
    height: usize,
    pointer: PointerTracker,
}

impl WindowSurface {
    /// Open a window with content area exactly `width` x `height`
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, Error> {
        let width = width as usize;
        let height = height as usize;

        let mut window = Window::new(title, width, height, WindowOptions::default())?;
        // The session paces its own polling
        window.limit_update_rate(None);

        info!("Opened window \"{}\" ({}x{})", title, width, height);

        Ok(Self {
            window,
            width,
            height,
            pointer: PointerTracker::default(),
        })
    }
}

impl DisplaySurface for WindowSurface {
    fn poll_events(&mut self) -> Vec<SessionEvent> {
        self.window.update();

        // ESC, key code 27
        if self.window.is_key_down(Key::Escape) {
            return vec![SessionEvent::Quit];
        }

        let mut events = Vec::new();
        if self.window.is_key_pressed(Key::R, KeyRepeat::No) {
            events.push(SessionEvent::Reset);
        }

        let position = self
            .window
            .get_mouse_pos(MouseMode::Discard)
            .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32));
        let button_down = self.window.get_mouse_down(MouseButton::Left);

        events.extend(
            self.pointer
                .update(position, button_down)
                .into_iter()
                .map(SessionEvent::Pointer),
        );
        events
    }

    fn present(&mut self, frame: &RgbImage) -> Result<(), Error> {
        let buffer = to_display_buffer(frame);
        self.window.update_with_buffer(&buffer, self.width, self.height)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        info!("Closing window");
    }
}
