use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::{error::CanvasError, types::Point2D};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Brush {
    pub color: Rgba<u8>,
    pub width: u32,
    pub eraser: bool,
}

impl Brush {
    fn radius(&self) -> f32 {
        self.width.max(1) as f32 / 2.0
    }

    fn paint(&self) -> [u8; 4] {
        if self.eraser {
            TRANSPARENT
        } else {
            let [r, g, b, _] = self.color.0;
            [r, g, b, 255]
        }
    }
}

/// Ink over an optional background over white.
///
/// Strokes only ever touch `ink`; the background is a separate, pre-fitted
/// layer so replacing it never loses drawing.
#[derive(Clone)]
pub struct LayeredCanvas {
    width: u32,
    height: u32,
    ink: RgbaImage,
    background: Option<RgbaImage>,
}

impl LayeredCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::EmptyCanvas { width, height });
        }
        Ok(Self {
            width,
            height,
            ink: RgbaImage::new(width, height),
            background: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ink(&self) -> &RgbaImage {
        &self.ink
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    /// `layer` must already match the canvas size.
    pub fn set_background(&mut self, layer: RgbaImage) -> Result<(), CanvasError> {
        if layer.dimensions() != (self.width, self.height) {
            return Err(CanvasError::Resize(format!(
                "background is {}x{}, canvas is {}x{}",
                layer.width(),
                layer.height(),
                self.width,
                self.height
            )));
        }
        self.background = Some(layer);
        Ok(())
    }

    pub fn remove_background(&mut self) {
        self.background = None;
    }

    pub fn clear_ink(&mut self) {
        self.ink
            .par_chunks_mut(4)
            .for_each(|px| px.copy_from_slice(&TRANSPARENT));
    }

    /// Drops all ink and the background.
    pub fn clear(&mut self) {
        self.clear_ink();
        self.background = None;
    }

    pub fn restore_ink(&mut self, ink: &RgbaImage) {
        if ink.dimensions() == self.ink.dimensions() {
            self.ink.copy_from_slice(ink);
        } else {
            log::warn!(
                "ignoring ink snapshot of {:?}, canvas is {}x{}",
                ink.dimensions(),
                self.width,
                self.height
            );
        }
    }

    /// Draws a round-capped segment. Non-finite endpoints are rejected.
    pub fn draw_segment(&mut self, from: Point2D, to: Point2D, brush: &Brush) -> bool {
        if !from.is_finite() || !to.is_finite() {
            log::debug!("rejecting non-finite segment {from:?} -> {to:?}");
            return false;
        }

        let radius = brush.radius();
        let paint = brush.paint();
        let (w, h) = (self.width as i64, self.height as i64);

        let min_x = ((from.x.min(to.x) - radius).floor() as i64).max(0);
        let max_x = ((from.x.max(to.x) + radius).ceil() as i64).min(w - 1);
        let min_y = ((from.y.min(to.y) - radius).floor() as i64).max(0);
        let max_y = ((from.y.max(to.y) + radius).ceil() as i64).min(h - 1);
        if min_x > max_x || min_y > max_y {
            return true;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = Point2D::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(center, from, to) <= radius {
                    put_pixel_safe(&mut self.ink, x, y, paint);
                }
            }
        }
        true
    }

    /// Flattens the layers onto white.
    pub fn composite(&self) -> RgbaImage {
        let mut out = RgbaImage::from_pixel(self.width, self.height, WHITE);
        let row_len = self.width as usize * 4;
        let ink = self.ink.as_raw();
        let background = self.background.as_ref().map(|b| b.as_raw());

        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, dst_row)| {
                let start = row * row_len;
                for (i, dst) in dst_row.chunks_exact_mut(4).enumerate() {
                    let offset = start + i * 4;
                    if let Some(bg) = background {
                        blend_over(dst, &bg[offset..offset + 4]);
                    }
                    blend_over(dst, &ink[offset..offset + 4]);
                }
            });
        out
    }

    pub fn export_png(&self) -> Result<Vec<u8>, CanvasError> {
        let mut bytes = Cursor::new(Vec::new());
        self.composite().write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }
}

/// Source-over onto an opaque destination.
fn blend_over(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        0 => {}
        255 => dst[..3].copy_from_slice(&src[..3]),
        alpha => {
            let a = u32::from(alpha);
            for c in 0..3 {
                let s = u32::from(src[c]);
                let d = u32::from(dst[c]);
                dst[c] = ((s * a + d * (255 - a) + 127) / 255) as u8;
            }
        }
    }
}

fn distance_to_segment(p: Point2D, a: Point2D, b: Point2D) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance(Point2D::new(a.x + t * abx, a.y + t * aby))
}

fn put_pixel_safe(image: &mut RgbaImage, x: i64, y: i64, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= i64::from(image.width()) || y >= i64::from(image.height()) {
        return;
    }
    image.put_pixel(x as u32, y as u32, Rgba(color));
}
