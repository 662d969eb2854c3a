//! PDF serialization of an [`OutputDocument`].
//!
//! Each page carries one FlateDecode RGB image XObject drawn at the margin
//! offset. The output has no timestamps, so identical documents produce
//! identical bytes.

use log::debug;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, TextStr};

use crate::paginate::OutputDocument;
use crate::{Error, Result};

const IMAGE_NAME: &[u8] = b"Im1";
const PRODUCER: &str = concat!("rfprint ", env!("CARGO_PKG_VERSION"));

struct PageRefs {
    page: Ref,
    content: Ref,
    image: Ref,
}

/// Serialize `doc` to PDF bytes. The document is fully assembled in memory;
/// any failure leaves nothing behind.
pub fn encode(doc: &OutputDocument, title: Option<&str>) -> Result<Vec<u8>> {
    if doc.pages.is_empty() {
        return Err(Error::EncodingFailure("document has no pages".into()));
    }

    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();
    let refs: Vec<PageRefs> = doc
        .pages
        .iter()
        .map(|_| PageRefs { page: alloc(), content: alloc(), image: alloc() })
        .collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(refs.iter().map(|r| r.page))
        .count(refs.len() as i32);

    let geometry = doc.geometry;
    for (index, (page, r)) in doc.pages.iter().zip(&refs).enumerate() {
        let (w, h) = page.image.dimensions();
        if w == 0 || h == 0 || w > i32::MAX as u32 || h > i32::MAX as u32 {
            return Err(Error::EncodingFailure(format!(
                "page {} has an unencodable {}x{} image",
                index + 1,
                w,
                h
            )));
        }

        // Backgrounds are opaque, so alpha is dropped.
        let rgb: Vec<u8> = page.image.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&rgb, 6);
        {
            let mut xobj = pdf.image_xobject(r.image, &compressed);
            xobj.filter(Filter::FlateDecode);
            xobj.width(w as i32);
            xobj.height(h as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            xobj.finish();
        }

        let p = &page.placement;
        // PDF space grows upwards from the bottom-left corner
        let bottom = geometry.height - p.offset_y - p.placed_height;
        let mut content = Content::new();
        content.save_state();
        content.transform([p.placed_width, 0.0, 0.0, p.placed_height, p.offset_x, bottom]);
        content.x_object(Name(IMAGE_NAME));
        content.restore_state();
        let raw = content.finish();
        let stream = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
        pdf.stream(r.content, &stream).filter(Filter::FlateDecode);

        let mut pdf_page = pdf.page(r.page);
        pdf_page
            .media_box(Rect::new(0.0, 0.0, geometry.width, geometry.height))
            .parent(pages_id)
            .contents(r.content);
        pdf_page.resources().x_objects().pair(Name(IMAGE_NAME), r.image);
        pdf_page.finish();

        debug!(
            "page {}: rows {}..{} placed at ({}, {}) size {}x{}pt",
            index + 1,
            p.band.start,
            p.band.end(),
            p.offset_x,
            bottom,
            p.placed_width,
            p.placed_height
        );
    }

    {
        let mut info = pdf.document_info(info_id);
        if let Some(title) = title {
            info.title(TextStr(title));
        }
        info.producer(TextStr(PRODUCER));
    }

    Ok(pdf.finish())
}

impl OutputDocument {
    /// Serialize to PDF; see [`encode`].
    pub fn to_pdf(&self, title: Option<&str>) -> Result<Vec<u8>> {
        encode(self, title)
    }
}
