//! The shared drawing surface of a merge.

use image::{imageops, Rgba, RgbaImage};

use crate::source::ClipInfo;

/// Fixed-size RGBA surface that every clip is drawn onto.
///
/// Clips smaller than the canvas are centered without scaling; the rest of
/// the surface shows the background colour.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    background: Rgba<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> Self {
        let background = Rgba(background);
        Self {
            image: RgbaImage::from_pixel(width, height, background),
            background,
        }
    }

    /// Canvas large enough for every clip: the maximum width by the maximum
    /// height. `None` when `clips` is empty.
    pub fn fitting<'a>(
        clips: impl IntoIterator<Item = &'a ClipInfo>,
        background: [u8; 4],
    ) -> Option<Self> {
        let (width, height) = clips
            .into_iter()
            .fold(None, |acc: Option<(u32, u32)>, info| {
                let (w, h) = acc.unwrap_or((0, 0));
                Some((w.max(info.width), h.max(info.height)))
            })?;
        Some(Self::new(width, height, background))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Fill the whole surface with the background colour.
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = self.background;
        }
    }

    /// Top-left position at which `width` x `height` content is centered.
    pub fn centered_origin(&self, width: u32, height: u32) -> (i64, i64) {
        (
            (i64::from(self.width()) - i64::from(width)) / 2,
            (i64::from(self.height()) - i64::from(height)) / 2,
        )
    }

    /// Draw `frame` centered on the canvas, unscaled.
    pub fn draw_centered(&mut self, frame: &RgbaImage) {
        let (x, y) = self.centered_origin(frame.width(), frame.height());
        imageops::replace(&mut self.image, frame, x, y);
    }
}
