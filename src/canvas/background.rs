use std::{fs, path::PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use fast_image_resize as fir;
use image::{DynamicImage, RgbaImage};

use crate::{
    config::{MAX_BACKGROUND_OPACITY, MIN_BACKGROUND_OPACITY},
    error::CanvasError,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackgroundSource {
    Path(PathBuf),
    DataUri(String),
}

impl BackgroundSource {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("data:") {
            BackgroundSource::DataUri(trimmed.to_string())
        } else {
            BackgroundSource::Path(PathBuf::from(trimmed))
        }
    }

    pub fn load(&self) -> Result<DynamicImage, CanvasError> {
        let bytes = match self {
            BackgroundSource::Path(path) => {
                fs::read(path).map_err(|source| CanvasError::ReadBackground {
                    path: path.clone(),
                    source,
                })?
            }
            BackgroundSource::DataUri(uri) => decode_data_uri(uri)?,
        };
        Ok(image::load_from_memory(&bytes)?)
    }
}

/// `data:image/<kind>;base64,<payload>`
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, CanvasError> {
    let rest = uri.strip_prefix("data:").ok_or(CanvasError::InvalidDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(CanvasError::InvalidDataUri)?;
    if !header.ends_with(";base64") || !header.starts_with("image/") {
        return Err(CanvasError::InvalidDataUri);
    }
    Ok(STANDARD.decode(payload.trim())?)
}

/// Scales `image` to fit inside `width`x`height` keeping its aspect ratio,
/// centers it on a transparent layer and applies `opacity` percent.
pub fn fit_background(
    image: &DynamicImage,
    width: u32,
    height: u32,
    opacity: u8,
) -> Result<RgbaImage, CanvasError> {
    if width == 0 || height == 0 {
        return Err(CanvasError::EmptyCanvas { width, height });
    }
    let src = image.to_rgba8();
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(CanvasError::Resize("background image has no pixels".into()));
    }

    let scale = (width as f32 / src_w as f32).min(height as f32 / src_h as f32);
    let fit_w = ((src_w as f32 * scale).round() as u32).clamp(1, width);
    let fit_h = ((src_h as f32 * scale).round() as u32).clamp(1, height);

    let resized = if (fit_w, fit_h) == (src_w, src_h) {
        src.into_raw()
    } else {
        let src_image = fir::images::Image::from_vec_u8(src_w, src_h, src.into_raw(), fir::PixelType::U8x4)
            .map_err(|err| CanvasError::Resize(err.to_string()))?;
        let mut dst_image = fir::images::Image::new(fit_w, fit_h, fir::PixelType::U8x4);
        let mut resizer = fir::Resizer::new();
        let options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|err| CanvasError::Resize(err.to_string()))?;
        dst_image.into_vec()
    };

    let opacity = u32::from(opacity.clamp(MIN_BACKGROUND_OPACITY, MAX_BACKGROUND_OPACITY));
    let off_x = (width - fit_w) / 2;
    let off_y = (height - fit_h) / 2;
    let mut layer = RgbaImage::new(width, height);
    for (i, px) in resized.chunks_exact(4).enumerate() {
        let x = off_x + (i as u32 % fit_w);
        let y = off_y + (i as u32 / fit_w);
        let alpha = (u32::from(px[3]) * opacity / 100) as u8;
        layer.put_pixel(x, y, image::Rgba([px[0], px[1], px[2], alpha]));
    }

    log::debug!(
        "background {}x{} fitted to {}x{} at ({}, {}), opacity {}%",
        src_w,
        src_h,
        fit_w,
        fit_h,
        off_x,
        off_y,
        opacity
    );
    Ok(layer)
}
