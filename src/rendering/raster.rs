/// Rasterizer: executes a display list into an RGBA canvas at a device scale.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::layout::GLYPH;
use super::paint::PaintCommand;
use crate::{Error, Result};

/// Upper bound on canvas size; roughly 800MB of RGBA.
pub const MAX_PIXELS: u64 = 200_000_000;

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Clamp a device-space rectangle to the canvas; `None` if nothing is visible.
fn clip(canvas: &RgbaImage, x: i64, y: i64, w: u64, h: u64) -> Option<(u32, u32, u32, u32)> {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w as i64).min(canvas.width() as i64);
    let y1 = (y + h as i64).min(canvas.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

fn fill(canvas: &mut RgbaImage, x: i64, y: i64, w: u64, h: u64, rgba: Rgba<u8>) {
    if let Some((x0, y0, x1, y1)) = clip(canvas, x, y, w, h) {
        for py in y0..y1 {
            for px in x0..x1 {
                canvas.put_pixel(px, py, rgba);
            }
        }
    }
}

fn draw_text(canvas: &mut RgbaImage, x: i64, y: i64, text: &str, dot: u64, rgba: Rgba<u8>) {
    let advance = GLYPH as i64 * dot as i64;
    for (i, ch) in text.chars().enumerate() {
        let gx = x + i as i64 * advance;
        if gx >= canvas.width() as i64 {
            break;
        }
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..8 {
                // bit 0 is the leftmost pixel
                if bits & (1 << col) != 0 {
                    fill(canvas, gx + col as i64 * dot as i64, y + row as i64 * dot as i64, dot, dot, rgba);
                }
            }
        }
    }
}

/// Execute `commands` into a canvas of `width × height` logical units scaled
/// by `scale`.
pub fn rasterize(commands: &[PaintCommand], width: u32, height: u32, scale: u32) -> Result<RgbaImage> {
    if scale == 0 {
        return Err(Error::RenderFailure("scale factor must be at least 1".into()));
    }
    let (pw, ph) = match (width.checked_mul(scale), height.checked_mul(scale)) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(Error::RenderFailure(format!(
                "cannot allocate {}x{} canvas at scale {}",
                width, height, scale
            )))
        }
    };
    if pw as u64 * ph as u64 > MAX_PIXELS {
        return Err(Error::RenderFailure(format!("canvas {}x{} exceeds the pixel budget", pw, ph)));
    }

    let s = scale as i64;
    let mut canvas = RgbaImage::new(pw, ph);
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, rgba } => {
                fill(&mut canvas, *x as i64 * s, *y as i64 * s, *width as u64 * s as u64, *height as u64 * s as u64, *rgba);
            }
            PaintCommand::Text { x, y, text, scale: glyph_scale, rgba } => {
                draw_text(&mut canvas, *x as i64 * s, *y as i64 * s, text, *glyph_scale as u64 * s as u64, *rgba);
            }
            PaintCommand::Image { x, y, width, height, image } => {
                let resized = imageops::resize(image.as_ref(), width * scale, height * scale, FilterType::Triangle);
                imageops::overlay(&mut canvas, &resized, *x as i64 * s, *y as i64 * s);
            }
        }
    }
    Ok(canvas)
}
