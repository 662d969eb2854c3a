//! Document rasterizer
//!
//! Turns one off-screen clone into a single full-height [`Bitmap`]. The
//! built-in [`BlockRasterizer`] runs layout → paint → raster without a
//! browser; other backends plug in through [`RasterBackend`].

pub mod layout;
pub mod paint;
pub mod raster;
pub mod style;

use std::io::Cursor;

use image::{Rgba, RgbaImage};
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::dom::{Document, OffscreenClone};
use crate::{Error, Result};

/// A rasterized region. Pixel width is the design width times the scale
/// factor; pixel height is the natural content height times the scale factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl Bitmap {
    pub fn new(pixels: RgbaImage) -> Self {
        let (width, height) = pixels.dimensions();
        Self { width, height, pixels }
    }

    /// Encode the bitmap as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| Error::EncodingFailure(format!("PNG encoding failed: {}", e)))?;
        Ok(buf)
    }

    /// SHA-256 of the raw pixel rows, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_be_bytes());
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.pixels.as_raw());
        hex::encode(hasher.finalize())
    }
}

/// Fixed parameters of one rasterization pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Logical width the clone is forced to
    pub design_width: u32,
    /// Device pixel multiplier
    pub scale: u32,
    /// Background used when the preview node declares none
    pub background: Rgba<u8>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            design_width: 800,
            scale: 2,
            background: style::WHITE,
        }
    }
}

/// A backend able to rasterize an off-screen clone.
pub trait RasterBackend: Send {
    /// Rasterize the clone at `scale`. The clone's region already carries the
    /// forced design width and an opaque background.
    fn rasterize(&self, clone: &OffscreenClone<'_>, scale: u32) -> Result<Bitmap>;

    /// Short backend name for logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Pure-Rust block renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockRasterizer;

impl BlockRasterizer {
    pub fn new() -> Self {
        BlockRasterizer
    }
}

impl RasterBackend for BlockRasterizer {
    fn rasterize(&self, clone: &OffscreenClone<'_>, scale: u32) -> Result<Bitmap> {
        let region = clone.region();
        let layout = layout::layout_fragment(&region.markup, region.width)?;
        let commands = paint::build_display_list(&layout, region.background);
        debug!(
            "laid out {} boxes, natural height {} ({} paint commands)",
            layout.nodes.len(),
            layout.height,
            commands.len()
        );
        let pixels = raster::rasterize(&commands, layout.width, layout.height, scale)?;
        Ok(Bitmap::new(pixels))
    }

    fn name(&self) -> &'static str {
        "block"
    }
}

/// Capture the node matching `selector` as one full-height bitmap.
///
/// The node is cloned, forced to the design width and mounted off-screen for
/// the duration of the call; the mount is released on every exit path. Any
/// backend error is reported as a single [`Error::RenderFailure`].
pub fn capture<B: RasterBackend + ?Sized>(
    backend: &B,
    document: &Document,
    selector: &str,
    options: &RasterOptions,
) -> Result<Bitmap> {
    if options.design_width == 0 || options.scale == 0 {
        return Err(Error::RenderFailure(format!(
            "invalid raster options: width {} scale {}",
            options.design_width, options.scale
        )));
    }
    let region = document
        .clone_node(selector, options.background)?
        .with_width(options.design_width);
    let clone = document.mount_offscreen(region);

    let bitmap = backend.rasterize(&clone, options.scale).map_err(|e| match e {
        Error::RenderFailure(msg) => Error::RenderFailure(msg),
        other => Error::RenderFailure(other.to_string()),
    })?;
    drop(clone);

    let expected_width = options.design_width * options.scale;
    if bitmap.width != expected_width || bitmap.height == 0 || bitmap.height % options.scale != 0 {
        return Err(Error::RenderFailure(format!(
            "{} backend produced a {}x{} bitmap, expected width {} and a height divisible by {}",
            backend.name(),
            bitmap.width,
            bitmap.height,
            expected_width,
            options.scale
        )));
    }
    info!(
        "captured {:?} with {} backend: {}x{} px",
        selector,
        backend.name(),
        bitmap.width,
        bitmap.height
    );
    Ok(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl RasterBackend for Failing {
        fn rasterize(&self, _clone: &OffscreenClone<'_>, _scale: u32) -> Result<Bitmap> {
            Err(Error::Other("font subsystem crashed".into()))
        }
    }

    const PAGE: &str = r#"<html><body><div id="invoice-preview"><h1>Invoice</h1><p>Total: $10</p></div></body></html>"#;

    #[test]
    fn bitmap_dimensions_follow_scale() {
        let doc = Document::parse(PAGE);
        let opts = RasterOptions { design_width: 300, scale: 2, ..Default::default() };
        let bmp = capture(&BlockRasterizer::new(), &doc, "#invoice-preview", &opts).unwrap();
        assert_eq!(bmp.width, 600);
        let layout = layout::layout_fragment(
            r#"<div id="invoice-preview"><h1>Invoice</h1><p>Total: $10</p></div>"#,
            300,
        )
        .unwrap();
        assert_eq!(bmp.height, layout.height * 2);
        assert_eq!(doc.offscreen_len(), 0);
    }

    #[test]
    fn backend_errors_become_render_failures_and_release_the_clone() {
        let doc = Document::parse(PAGE);
        let err = capture(&Failing, &doc, "#invoice-preview", &RasterOptions::default()).unwrap_err();
        match err {
            Error::RenderFailure(msg) => assert!(msg.contains("font subsystem crashed")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(doc.offscreen_len(), 0);
    }

    #[test]
    fn unmounted_preview_is_reported_before_any_render() {
        let doc = Document::parse("<html><body></body></html>");
        let err = capture(&Failing, &doc, "#invoice-preview", &RasterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));
    }

    #[test]
    fn digest_is_stable_and_png_has_signature() {
        let doc = Document::parse(PAGE);
        let opts = RasterOptions { design_width: 120, scale: 1, ..Default::default() };
        let a = capture(&BlockRasterizer, &doc, "#invoice-preview", &opts).unwrap();
        let b = capture(&BlockRasterizer, &doc, "#invoice-preview", &opts).unwrap();
        assert_eq!(a.digest(), b.digest());
        let png = a.to_png().unwrap();
        assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
    }
}
