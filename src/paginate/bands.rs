//! Geometry math for slicing a bitmap into page bands. No pixels are touched
//! here.

use super::geometry::PageGeometry;
use crate::{Error, Result};

/// Tolerance for float noise when converting points back to pixel rows.
const EPSILON: f64 = 1e-6;

/// A run of bitmap rows `[start, start + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub start: u32,
    pub height: u32,
}

impl Band {
    /// One past the last row, saturating at `u32::MAX`.
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.height)
    }
}

/// Points per bitmap pixel when the bitmap spans the content width.
pub fn scale_ratio(geometry: &PageGeometry, bitmap_width: u32) -> Result<f64> {
    if bitmap_width == 0 {
        return Err(Error::PaginationFailure("bitmap has zero width".into()));
    }
    geometry.validate()?;
    Ok(geometry.content_width() as f64 / bitmap_width as f64)
}

/// The largest number of bitmap rows whose placed height fits one page's
/// content height. Always at least 1.
pub fn band_pixel_height(geometry: &PageGeometry, bitmap_width: u32) -> Result<u32> {
    let ratio = scale_ratio(geometry, bitmap_width)?;
    let rows = (geometry.content_height() as f64 / ratio + EPSILON).floor();
    Ok(rows.clamp(1.0, u32::MAX as f64) as u32)
}

/// Split `[0, bitmap_height)` into contiguous bands of `band_height` rows.
/// The last band holds the remainder, in `(0, band_height]`.
pub fn compute_bands(bitmap_height: u32, band_height: u32) -> Result<Vec<Band>> {
    if bitmap_height == 0 {
        return Err(Error::PaginationFailure("bitmap has zero height".into()));
    }
    if band_height == 0 {
        return Err(Error::PaginationFailure("band height must be positive".into()));
    }
    let mut bands = Vec::with_capacity(bitmap_height.div_ceil(band_height) as usize);
    let mut drawn = 0u32;
    while drawn < bitmap_height {
        let height = band_height.min(bitmap_height - drawn);
        bands.push(Band { start: drawn, height });
        drawn += height;
    }
    Ok(bands)
}
