use crate::config::Preferences;
use image::imageops::{self, FilterType};
use image::{ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Status bar icons are drawn at 2x so they stay sharp on Retina displays.
pub const BACKING_SCALE: u32 = 2;
pub const STATUS_ITEM_MAX_ASPECT: f32 = 5.0;
pub const PREVIEW_MAX_ASPECT: f32 = 3.0;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub height_pt: u32,
    pub scale: u32,
    pub max_aspect: f32,
    pub overlay: Option<f32>,
}

impl RenderOptions {
    pub fn status_item(prefs: &Preferences) -> Self {
        Self {
            height_pt: prefs.icon_height,
            scale: BACKING_SCALE,
            max_aspect: STATUS_ITEM_MAX_ASPECT,
            overlay: prefs.overlay(),
        }
    }

    /// Menu thumbnails never get the white mask so the original image stays
    /// recognisable.
    pub fn preview(prefs: &Preferences) -> Self {
        Self {
            height_pt: prefs.icon_height,
            scale: BACKING_SCALE,
            max_aspect: PREVIEW_MAX_ASPECT,
            overlay: None,
        }
    }
}

pub struct RenderedIcon {
    pub image: RgbaImage,
    pub scale: u32,
}

impl RenderedIcon {
    /// Size in points, as the status bar lays it out.
    pub fn point_size(&self) -> (f64, f64) {
        let scale = self.scale.max(1) as f64;
        (
            self.image.width() as f64 / scale,
            self.image.height() as f64 / scale,
        )
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        encode_png(&self.image)
    }
}

pub fn load_bitmap(path: &Path) -> Result<RgbaImage, RenderError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(RenderError::Empty);
    }
    Ok(rgba)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Fit `source` into a canvas of the target height.
///
/// The bitmap keeps its aspect ratio; its width is capped at
/// `max_aspect * height`, in which case the drawn height shrinks and the
/// bitmap is centred vertically. The canvas is exactly as wide as the drawn
/// bitmap.
pub fn render_status_icon(source: &RgbaImage, options: &RenderOptions) -> RenderedIcon {
    let scale = options.scale.max(1);
    let canvas_h = options.height_pt.max(1) * scale;
    let target_h = canvas_h as f32;

    let (src_w, src_h) = source.dimensions();
    let aspect = src_w.max(1) as f32 / src_h.max(1) as f32;
    let max_w = target_h * options.max_aspect.max(f32::EPSILON);

    let mut scaled_w = target_h * aspect;
    let mut scaled_h = target_h;
    if scaled_w > max_w {
        scaled_w = max_w;
        scaled_h = max_w / aspect;
    }

    let draw_w = (scaled_w.round() as u32).clamp(1, max_w.floor().max(1.0) as u32);
    let draw_h = (scaled_h.round() as u32).clamp(1, canvas_h);

    let mut canvas = RgbaImage::new(draw_w, canvas_h);
    if src_w > 0 && src_h > 0 {
        let resized = imageops::resize(source, draw_w, draw_h, FilterType::Lanczos3);
        let origin_y = (canvas_h - draw_h) / 2;
        imageops::replace(&mut canvas, &resized, 0, origin_y as i64);
    }

    if let Some(strength) = options.overlay {
        apply_white_mask(&mut canvas, strength);
    }

    RenderedIcon {
        image: canvas,
        scale,
    }
}

/// White fill composited source-atop: only pixels that already carry some
/// alpha are lightened, and alpha itself never changes.
pub fn apply_white_mask(image: &mut RgbaImage, strength: f32) {
    let strength = strength.clamp(0.0, 1.0);
    if strength == 0.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        if pixel[3] == 0 {
            continue;
        }
        for channel in &mut pixel.0[..3] {
            let c = *channel as f32;
            *channel = (c + (255.0 - c) * strength).round().min(255.0) as u8;
        }
    }
}
