//! Page paginator
//!
//! Slices one [`Bitmap`] into page-sized bands. [`plan`] is pure geometry;
//! [`render`] copies the pixel rows of each band into its own page image.
//!
//! ```
//! use rfprint::paginate::{compute_bands, Band};
//!
//! let bands = compute_bands(2600, 1000).unwrap();
//! assert_eq!(bands.iter().map(|b| b.height).collect::<Vec<_>>(), vec![1000, 1000, 600]);
//! assert_eq!(bands[1], Band { start: 1000, height: 1000 });
//! ```

pub mod bands;
pub mod geometry;

pub use bands::{band_pixel_height, compute_bands, scale_ratio, Band};
pub use geometry::{PageGeometry, Paper};

use image::{imageops, RgbaImage};
use log::debug;

use crate::rendering::Bitmap;
use crate::{Error, Result};

/// One band and where it lands on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBand {
    pub band: Band,
    /// Points per bitmap pixel (content width ÷ bitmap width)
    pub scale_ratio: f64,
    /// Placed size in points
    pub placed_width: f32,
    pub placed_height: f32,
    /// Top-left corner of the image, measured from the page's top-left
    pub offset_x: f32,
    pub offset_y: f32,
}

impl PageBand {
    fn new(band: Band, ratio: f64, geometry: &PageGeometry) -> Self {
        Self {
            band,
            scale_ratio: ratio,
            placed_width: geometry.content_width(),
            placed_height: (band.height as f64 * ratio) as f32,
            offset_x: geometry.margin,
            offset_y: geometry.margin,
        }
    }
}

/// Compute page placements for a `bitmap_width × bitmap_height` bitmap.
///
/// When the whole bitmap fits one content box a single band covering every
/// row is returned without slicing.
pub fn plan(bitmap_width: u32, bitmap_height: u32, geometry: &PageGeometry) -> Result<Vec<PageBand>> {
    geometry.validate()?;
    if bitmap_height == 0 {
        return Err(Error::PaginationFailure("bitmap has zero height".into()));
    }
    let ratio = scale_ratio(geometry, bitmap_width)?;
    let band_height = band_pixel_height(geometry, bitmap_width)?;

    // band_height is the most rows whose placed height fits the content box,
    // so this is the physical fit test.
    if bitmap_height <= band_height {
        debug!("single page: {} rows fit {} per page", bitmap_height, band_height);
        let whole = Band { start: 0, height: bitmap_height };
        return Ok(vec![PageBand::new(whole, ratio, geometry)]);
    }

    let bands = compute_bands(bitmap_height, band_height)?;
    debug!(
        "slicing {} rows into {} pages of up to {} rows (ratio {:.4}pt/px)",
        bitmap_height,
        bands.len(),
        band_height,
        ratio
    );
    Ok(bands.into_iter().map(|b| PageBand::new(b, ratio, geometry)).collect())
}

/// One output page: its placement and a copy of the band's pixel rows.
#[derive(Debug, Clone)]
pub struct Page {
    pub placement: PageBand,
    pub image: RgbaImage,
}

/// Ordered pages sharing one geometry.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Copy each band's rows out of `bitmap` onto its own page. The source
/// bitmap is left untouched.
pub fn render(bitmap: &Bitmap, bands: &[PageBand], geometry: &PageGeometry) -> Result<OutputDocument> {
    if bands.is_empty() {
        return Err(Error::PaginationFailure("no bands to render".into()));
    }
    let mut pages = Vec::with_capacity(bands.len());
    for placement in bands {
        let band = placement.band;
        let in_range = band.start.checked_add(band.height).is_some_and(|end| end <= bitmap.height);
        if band.height == 0 || !in_range {
            return Err(Error::PaginationFailure(format!(
                "band {}..{} outside bitmap of height {}",
                band.start,
                band.end(),
                bitmap.height
            )));
        }
        let image = imageops::crop_imm(&bitmap.pixels, 0, band.start, bitmap.width, band.height).to_image();
        pages.push(Page { placement: *placement, image });
    }
    Ok(OutputDocument { geometry: *geometry, pages })
}

/// [`plan`] then [`render`].
pub fn paginate(bitmap: &Bitmap, geometry: &PageGeometry) -> Result<OutputDocument> {
    let bands = plan(bitmap.width, bitmap.height, geometry)?;
    render(bitmap, &bands, geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 500x500pt content box: a 1000px wide bitmap gives 1000-row bands.
    fn test_geometry() -> PageGeometry {
        PageGeometry::new(520.0, 520.0, 10.0)
    }

    /// Every row carries its own index in the red/green channels.
    fn striped(width: u32, height: u32) -> Bitmap {
        let pixels = RgbaImage::from_fn(width, height, |_, y| Rgba([(y % 256) as u8, (y / 256) as u8, 0, 255]));
        Bitmap::new(pixels)
    }

    fn row_id(img: &RgbaImage, y: u32) -> u32 {
        let p = img.get_pixel(0, y);
        p[0] as u32 + p[1] as u32 * 256
    }

    #[test]
    fn tall_bitmap_slices_into_three_pages_without_overlap() {
        let bmp = striped(1000, 2600);
        let doc = paginate(&bmp, &test_geometry()).unwrap();
        assert_eq!(doc.page_count(), 3);

        let heights: Vec<u32> = doc.pages.iter().map(|p| p.image.height()).collect();
        assert_eq!(heights, vec![1000, 1000, 600]);

        let mut seen = Vec::new();
        for page in &doc.pages {
            for y in 0..page.image.height() {
                seen.push(row_id(&page.image, y));
            }
        }
        assert_eq!(seen, (0..2600).collect::<Vec<_>>());

        assert_eq!(doc.pages[0].placement.placed_height, 500.0);
        assert_eq!(doc.pages[2].placement.placed_height, 300.0);
        assert_eq!(doc.pages[2].placement.offset_y, 10.0);
    }

    #[test]
    fn short_bitmap_is_one_unsliced_page() {
        let bmp = striped(1000, 900);
        let bands = plan(bmp.width, bmp.height, &test_geometry()).unwrap();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].band, Band { start: 0, height: 900 });

        let doc = render(&bmp, &bands, &test_geometry()).unwrap();
        assert_eq!(Bitmap::new(doc.pages[0].image.clone()).digest(), bmp.digest());
        assert_eq!(doc.pages[0].placement.placed_height, 450.0);
    }

    #[test]
    fn exact_page_height_stays_on_one_page() {
        let bands = plan(1000, 1000, &test_geometry()).unwrap();
        assert_eq!(bands.len(), 1);
        let bands = plan(1000, 1001, &test_geometry()).unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[1].band, Band { start: 1000, height: 1 });
    }

    #[test]
    fn empty_bitmap_and_bad_geometry_fail() {
        assert!(matches!(plan(1000, 0, &test_geometry()), Err(Error::PaginationFailure(_))));
        let squeezed = PageGeometry::new(520.0, 20.0, 10.0);
        assert!(matches!(plan(1000, 10, &squeezed), Err(Error::PaginationFailure(_))));
    }

    #[test]
    fn render_rejects_bands_outside_the_bitmap() {
        let bmp = striped(10, 10);
        let g = test_geometry();
        let bad = PageBand::new(Band { start: 5, height: 6 }, 1.0, &g);
        assert!(matches!(render(&bmp, &[bad], &g), Err(Error::PaginationFailure(_))));
        assert!(matches!(render(&bmp, &[], &g), Err(Error::PaginationFailure(_))));
    }

    #[test]
    fn render_rejects_bands_whose_end_overflows() {
        let bmp = striped(10, 10);
        let g = test_geometry();
        let wrapped = PageBand::new(Band { start: u32::MAX - 2, height: 8 }, 1.0, &g);
        assert!(matches!(render(&bmp, &[wrapped], &g), Err(Error::PaginationFailure(_))));
        assert_eq!(wrapped.band.end(), u32::MAX);
    }
}
