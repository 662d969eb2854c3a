//! Document host: the parsed preview page and its off-screen layer.
//!
//! The rasterizer never touches the live preview. It clones the node it
//! captures and mounts the clone into the document's off-screen layer for
//! exactly one pass. The mount is an RAII guard ([`OffscreenClone`]): the
//! clone is detached when the guard drops, whichever way the pass ends.

use std::cell::{Cell, RefCell};

use image::Rgba;
use log::debug;
use scraper::{Html, Selector};

use crate::rendering::style;
use crate::{Error, Result};

/// A cloned subtree ready to be rasterized.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRegion {
    /// Outer HTML of the cloned node
    pub markup: String,
    /// Logical layout width the clone is forced to
    pub width: u32,
    /// Opaque background fill
    pub background: Rgba<u8>,
}

impl SourceRegion {
    /// Force the logical width so text reflows the same regardless of the
    /// container the preview currently sits in.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }
}

#[derive(Debug)]
struct MountedNode {
    id: u64,
    width: u32,
}

/// A parsed HTML document holding the live invoice preview.
///
/// Not `Sync`: the off-screen layer is exclusively owned by whichever
/// rasterization pass currently holds an [`OffscreenClone`].
pub struct Document {
    html: Html,
    offscreen: RefCell<Vec<MountedNode>>,
    next_id: Cell<u64>,
}

impl Document {
    /// Parse a full HTML page.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            offscreen: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Clone the first node matching `selector`.
    ///
    /// Fails with [`Error::CaptureUnavailable`] when the preview has not been
    /// mounted (nothing matches) or the selector cannot be parsed.
    pub fn clone_node(&self, selector: &str, fallback_background: Rgba<u8>) -> Result<SourceRegion> {
        let sel = Selector::parse(selector)
            .map_err(|e| Error::CaptureUnavailable(format!("invalid selector {:?}: {:?}", selector, e)))?;
        let node = self
            .html
            .select(&sel)
            .next()
            .ok_or_else(|| Error::CaptureUnavailable(format!("no element matches {:?}", selector)))?;

        let background = style::background_of(node.value().attr("style")).unwrap_or(fallback_background);
        Ok(SourceRegion {
            markup: node.html(),
            width: 0,
            background: Rgba([background[0], background[1], background[2], 255]),
        })
    }

    /// Attach a clone to the off-screen layer for the duration of the guard.
    pub fn mount_offscreen(&self, region: SourceRegion) -> OffscreenClone<'_> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.offscreen.borrow_mut().push(MountedNode { id, width: region.width });
        debug!("mounted off-screen clone {} ({}px wide)", id, region.width);
        OffscreenClone { document: self, id, region }
    }

    /// Number of clones currently attached off-screen.
    pub fn offscreen_len(&self) -> usize {
        self.offscreen.borrow().len()
    }

    /// Page title, if any.
    pub fn title(&self) -> Option<String> {
        let sel = Selector::parse("title").ok()?;
        self.html
            .select(&sel)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn unmount(&self, id: u64) {
        let mut layer = self.offscreen.borrow_mut();
        if let Some(pos) = layer.iter().position(|n| n.id == id) {
            let node = layer.remove(pos);
            debug!("detached off-screen clone {} ({}px wide)", node.id, node.width);
        }
    }
}

/// A clone attached to a document's off-screen layer.
///
/// Dropping the guard detaches the clone.
pub struct OffscreenClone<'a> {
    document: &'a Document,
    id: u64,
    region: SourceRegion,
}

impl OffscreenClone<'_> {
    pub fn region(&self) -> &SourceRegion {
        &self.region
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for OffscreenClone<'_> {
    fn drop(&mut self) {
        self.document.unmount(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::style::WHITE;

    const PAGE: &str = r#"<html><head><title>Invoice INV-7</title></head><body>
        <div id="invoice-preview" style="background: #fafafa"><h1>Invoice</h1></div>
        </body></html>"#;

    #[test]
    fn clone_copies_markup_and_background() {
        let doc = Document::parse(PAGE);
        let region = doc.clone_node("#invoice-preview", WHITE).unwrap().with_width(800);
        assert!(region.markup.contains("<h1>Invoice</h1>"));
        assert_eq!(region.width, 800);
        assert_eq!(region.background, Rgba([0xfa, 0xfa, 0xfa, 255]));
        assert_eq!(doc.title().as_deref(), Some("Invoice INV-7"));
    }

    #[test]
    fn missing_preview_is_capture_unavailable() {
        let doc = Document::parse(PAGE);
        let err = doc.clone_node("#not-mounted", WHITE).unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));
        let err = doc.clone_node("###", WHITE).unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));
    }

    #[test]
    fn guard_detaches_on_drop() {
        let doc = Document::parse(PAGE);
        let region = doc.clone_node("#invoice-preview", WHITE).unwrap();
        {
            let a = doc.mount_offscreen(region.clone());
            let b = doc.mount_offscreen(region);
            assert_ne!(a.id(), b.id());
            assert_eq!(doc.offscreen_len(), 2);
            drop(a);
            assert_eq!(doc.offscreen_len(), 1);
        }
        assert_eq!(doc.offscreen_len(), 0);
    }

    #[test]
    fn guard_detaches_when_a_pass_panics() {
        let doc = Document::parse(PAGE);
        let region = doc.clone_node("#invoice-preview", WHITE).unwrap();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _clone = doc.mount_offscreen(region);
            panic!("rasterizer blew up");
        }));
        assert!(res.is_err());
        assert_eq!(doc.offscreen_len(), 0);
    }
}
