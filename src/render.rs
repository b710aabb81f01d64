//! Frame composition
//!
//! Draws the corner handles over a copy of either the source image or the
//! latest warp result, and packs frames for the window.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::config::HandleConfig;
use crate::geometry::Point;

/// Dash and gap lengths for the quad outline, in pixels
const DASH_LENGTH: f32 = 10.0;
const GAP_LENGTH: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct Compositor {
    marker_radius: i32,
    marker_color: Rgb<u8>,
    /// Outline colour, when the dashed quad outline is enabled
    outline: Option<Rgb<u8>>,
}

impl Compositor {
    pub fn new(marker_radius: i32, marker_color: Rgb<u8>) -> Self {
        Self {
            marker_radius,
            marker_color,
            outline: None,
        }
    }

    pub fn from_config(handles: &HandleConfig) -> Self {
        let compositor = Self::new(handles.marker_radius, Rgb(handles.marker_color));
        if handles.show_outline {
            compositor.with_outline(Rgb(handles.outline_color))
        } else {
            compositor
        }
    }

    pub fn with_outline(mut self, color: Rgb<u8>) -> Self {
        self.outline = Some(color);
        self
    }

    /// Copy `image` and draw the handles at `corners` on the copy
    pub fn compose(&self, image: &RgbImage, corners: &[Point; 4]) -> RgbImage {
        let mut frame = image.clone();

        if let Some(color) = self.outline {
            for i in 0..corners.len() {
                let from = corners[i];
                let to = corners[(i + 1) % corners.len()];
                draw_dashed_line(&mut frame, from, to, color);
            }
        }

        for corner in corners {
            draw_filled_circle_mut(&mut frame, (corner.x, corner.y), self.marker_radius, self.marker_color);
        }

        frame
    }
}

fn draw_dashed_line(frame: &mut RgbImage, from: Point, to: Point, color: Rgb<u8>) {
    let (x0, y0) = (from.x as f32, from.y as f32);
    let dx = to.x as f32 - x0;
    let dy = to.y as f32 - y0;
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1.0 {
        return;
    }

    let mut start = 0.0;
    while start < length {
        let end = (start + DASH_LENGTH).min(length);
        let a = (x0 + dx * start / length, y0 + dy * start / length);
        let b = (x0 + dx * end / length, y0 + dy * end / length);
        draw_line_segment_mut(frame, a, b, color);
        start += DASH_LENGTH + GAP_LENGTH;
    }
}

/// Pack RGB pixels as 0x00RRGGBB words for the window surface
pub fn to_display_buffer(frame: &RgbImage) -> Vec<u32> {
    frame
        .pixels()
        .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
        .collect()
}
