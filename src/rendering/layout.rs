/// Block layout for invoice previews.
///
/// Boxes are stacked vertically in logical units. There is no viewport:
/// layout runs until the content ends, which gives the natural height.

use std::sync::Arc;

use base64::Engine as _;
use image::{Rgba, RgbaImage};
use scraper::{ElementRef, Html, Node};

use super::raster::MAX_PIXELS;
use super::style::{self, BLACK};
use crate::{Error, Result};

/// Horizontal advance and line height of one glyph at scale 1.
pub const GLYPH: u32 = 8;
/// Inset around the whole region.
pub const INSET: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: u32,
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        let total = (self.box_model.border + self.box_model.padding) * 2;
        self.rect.width.saturating_sub(total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Title,
    Paragraph,
    TableRow,
    Rule,
    Image,
}

/// One cell of a table row, positioned relative to the region.
#[derive(Debug, Clone, PartialEq)]
pub struct CellBox {
    pub rect: Rect,
    pub lines: Vec<String>,
    pub header: bool,
}

#[derive(Debug, Clone)]
pub enum Content {
    Lines(Vec<String>),
    Cells(Vec<CellBox>),
    Rule,
    Image(Arc<RgbaImage>),
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    pub elem_type: ElementType,
    pub content: Content,
    pub scale: u32,
    pub color: Rgba<u8>,
    pub background: Option<Rgba<u8>>,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub width: u32,
    /// Natural content height in logical units (at least 1)
    pub height: u32,
    pub nodes: Vec<LayoutNode>,
}

const LEAF_BLOCKS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "tr", "hr", "img", "pre", "address", "dt", "dd",
    "caption", "blockquote",
];

const CONTAINERS: &[&str] = &[
    "html", "body", "div", "section", "article", "header", "footer", "main", "aside", "nav", "table",
    "thead", "tbody", "tfoot", "ul", "ol", "dl", "form", "fieldset", "figure",
];

const SKIPPED: &[&str] = &["head", "script", "style", "template", "noscript", "title", "meta", "link"];

fn is_block(tag: &str) -> bool {
    LEAF_BLOCKS.contains(&tag) || CONTAINERS.contains(&tag)
}

fn has_block_descendant(el: ElementRef<'_>) -> bool {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| is_block(e.value().name()))
}

/// Collapse whitespace the way normal flow does.
fn collapsed_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Node::Text(t) = node.value() {
            let skipped = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| SKIPPED.contains(&a.value().name()));
            if skipped {
                continue;
            }
            out.push(' ');
            out.push_str(t);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    let width = chars_per_line.max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !cur.is_empty() {
                lines.push(std::mem::take(&mut cur));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let cur_len = cur.chars().count();
        if !cur.is_empty() && cur_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.extend(word);
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

fn glyph_scale(tag: &str) -> u32 {
    match tag {
        "h1" | "h2" => 2,
        _ => 1,
    }
}

/// Decode an `<img>` source. Only inline `data:image/...;base64,` URIs are
/// supported; anything else would need a network fetch.
pub fn decode_image_source(src: &str) -> Result<RgbaImage> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| Error::RenderFailure(format!("unsupported image source: {}", truncate(src))))?;
    let (mime, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::RenderFailure("malformed data URI".into()))?;
    if !mime.starts_with("image/") || !mime.ends_with(";base64") {
        return Err(Error::RenderFailure(format!("unsupported data URI type: {}", mime)));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::RenderFailure(format!("invalid base64 image payload: {}", e)))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| Error::RenderFailure(format!("failed to decode embedded image: {}", e)))?;
    Ok(img.to_rgba8())
}

fn truncate(s: &str) -> String {
    if s.chars().count() > 48 {
        format!("{}...", s.chars().take(48).collect::<String>())
    } else {
        s.to_string()
    }
}

struct Flow {
    width: u32,
    y: u32,
    nodes: Vec<LayoutNode>,
}

fn too_tall(what: &str) -> Error {
    Error::RenderFailure(format!("{} overflows the layout height", what))
}

impl Flow {
    fn inner_width(&self) -> u32 {
        self.width.saturating_sub(INSET * 2)
    }

    /// Move the cursor down by `by` units. The cursor must stay addressable
    /// as an `i32` device coordinate.
    fn advance(&mut self, by: u32) -> Result<()> {
        self.y = self
            .y
            .checked_add(by)
            .filter(|y| *y <= i32::MAX as u32)
            .ok_or_else(|| too_tall("content"))?;
        Ok(())
    }

    fn push(&mut self, node: LayoutNode) -> Result<()> {
        let step = node
            .lb
            .rect
            .height
            .checked_add(node.lb.box_model.margin)
            .ok_or_else(|| too_tall("box"))?;
        self.advance(step)?;
        self.nodes.push(node);
        Ok(())
    }

    fn visit(&mut self, el: ElementRef<'_>, color: Rgba<u8>) -> Result<()> {
        let tag = el.value().name();
        if SKIPPED.contains(&tag) {
            return Ok(());
        }
        let style_attr = el.value().attr("style");
        let color = style::color_of(style_attr).unwrap_or(color);
        let background = style::background_of(style_attr);

        let leaf = LEAF_BLOCKS.contains(&tag) || !has_block_descendant(el);
        if !leaf {
            return self.children(el, color);
        }

        match tag {
            "hr" => self.rule(color),
            "img" => self.image(el),
            "tr" => self.row(el, color, background),
            _ => self.text_block(&collapsed_text(el), tag, color, background),
        }
    }

    /// Children of a container in document order. Loose text and inline
    /// elements between blocks form anonymous paragraphs.
    fn children(&mut self, el: ElementRef<'_>, color: Rgba<u8>) -> Result<()> {
        let mut run = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(t) => {
                    run.push(' ');
                    run.push_str(t);
                }
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else { continue };
                    let name = child.value().name();
                    if SKIPPED.contains(&name) {
                        continue;
                    }
                    if is_block(name) || has_block_descendant(child) {
                        self.anonymous(&mut run, color)?;
                        self.visit(child, color)?;
                    } else {
                        run.push(' ');
                        run.push_str(&collapsed_text(child));
                    }
                }
                _ => {}
            }
        }
        self.anonymous(&mut run, color)
    }

    fn anonymous(&mut self, run: &mut String, color: Rgba<u8>) -> Result<()> {
        let text = std::mem::take(run).split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Ok(());
        }
        self.text_block(&text, "p", color, None)
    }

    fn text_block(&mut self, text: &str, tag: &str, color: Rgba<u8>, background: Option<Rgba<u8>>) -> Result<()> {
        if text.is_empty() && background.is_none() {
            return Ok(());
        }
        let scale = glyph_scale(tag);
        let (padding, margin) = if scale > 1 { (8, 8) } else { (6, 6) };
        let content_w = self.inner_width().saturating_sub(padding * 2);
        let per_line = (content_w / (GLYPH * scale)).max(1) as usize;
        let lines = wrap_text(text, per_line);
        let height = u32::try_from(lines.len().max(1))
            .ok()
            .and_then(|n| n.checked_mul(GLYPH * scale))
            .and_then(|h| h.checked_add(padding * 2))
            .ok_or_else(|| too_tall("text block"))?;
        let elem_type = if tag.starts_with('h') && tag.len() == 2 { ElementType::Title } else { ElementType::Paragraph };
        let node = LayoutNode {
            lb: LayoutBox {
                rect: Rect { x: INSET as i32, y: self.y as i32, width: self.inner_width(), height },
                box_model: BoxModel { margin, border: 0, padding },
            },
            elem_type,
            content: Content::Lines(lines),
            scale,
            color,
            background,
        };
        self.push(node)
    }

    fn row(&mut self, el: ElementRef<'_>, color: Rgba<u8>, background: Option<Rgba<u8>>) -> Result<()> {
        let cells: Vec<ElementRef<'_>> = el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .collect();
        if cells.is_empty() {
            return Ok(());
        }
        let padding = 4u32;
        let total = self.inner_width();
        let n = cells.len() as u32;
        let base = total / n;

        let mut x = INSET;
        let mut boxes = Vec::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            let w = if i as u32 == n - 1 { total - base * (n - 1) } else { base };
            let per_line = (w.saturating_sub(padding * 2) / GLYPH).max(1) as usize;
            boxes.push(CellBox {
                rect: Rect { x: x as i32, y: self.y as i32, width: w, height: 0 },
                lines: wrap_text(&collapsed_text(*cell), per_line),
                header: cell.value().name() == "th",
            });
            x += w;
        }
        let max_lines = boxes.iter().map(|b| b.lines.len()).max().unwrap_or(0).max(1);
        let height = u32::try_from(max_lines)
            .ok()
            .and_then(|n| n.checked_mul(GLYPH))
            .and_then(|h| h.checked_add(padding * 2))
            .ok_or_else(|| too_tall("table row"))?;
        for b in &mut boxes {
            b.rect.height = height;
        }

        let node = LayoutNode {
            lb: LayoutBox {
                rect: Rect { x: INSET as i32, y: self.y as i32, width: total, height },
                box_model: BoxModel { margin: 0, border: 0, padding },
            },
            elem_type: ElementType::TableRow,
            content: Content::Cells(boxes),
            scale: 1,
            color,
            background,
        };
        self.push(node)
    }

    fn rule(&mut self, color: Rgba<u8>) -> Result<()> {
        self.advance(6)?;
        let node = LayoutNode {
            lb: LayoutBox {
                rect: Rect { x: INSET as i32, y: self.y as i32, width: self.inner_width(), height: 1 },
                box_model: BoxModel { margin: 6, border: 0, padding: 0 },
            },
            elem_type: ElementType::Rule,
            content: Content::Rule,
            scale: 1,
            color,
            background: None,
        };
        self.push(node)
    }

    fn image(&mut self, el: ElementRef<'_>) -> Result<()> {
        let src = el
            .value()
            .attr("src")
            .ok_or_else(|| Error::RenderFailure("<img> without src".into()))?;
        let img = decode_image_source(src)?;
        let attr = |name: &str| el.value().attr(name).and_then(|v| v.trim_end_matches("px").parse::<u64>().ok());

        let (iw, ih) = img.dimensions();
        let (iw, ih) = (iw as u64, ih as u64);
        let (mut w, mut h) = match (attr("width"), attr("height")) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, ih.saturating_mul(w) / iw.max(1)),
            (None, Some(h)) => (iw.saturating_mul(h) / ih.max(1), h),
            (None, None) => (iw, ih),
        };
        let max_w = self.inner_width() as u64;
        if w > max_w {
            h = h.saturating_mul(max_w) / w;
            w = max_w;
        }
        if w == 0 || h == 0 {
            return Ok(());
        }
        if w.saturating_mul(h) > MAX_PIXELS {
            return Err(Error::RenderFailure(format!("embedded image of {}x{} units is too large", w, h)));
        }

        let node = LayoutNode {
            lb: LayoutBox {
                rect: Rect { x: INSET as i32, y: self.y as i32, width: w as u32, height: h as u32 },
                box_model: BoxModel { margin: 8, border: 0, padding: 0 },
            },
            elem_type: ElementType::Image,
            content: Content::Image(Arc::new(img)),
            scale: 1,
            color: BLACK,
            background: None,
        };
        self.push(node)
    }
}

/// Lay out an HTML fragment at a fixed logical width.
pub fn layout_fragment(markup: &str, width: u32) -> Result<Layout> {
    if width <= INSET * 2 {
        return Err(Error::RenderFailure(format!("layout width {} leaves no room for content", width)));
    }
    let fragment = Html::parse_fragment(markup);
    let mut flow = Flow { width, y: INSET, nodes: Vec::new() };
    for child in fragment.root_element().children().filter_map(ElementRef::wrap) {
        flow.visit(child, BLACK)?;
    }
    let bottom = flow
        .nodes
        .iter()
        .map(|n| n.lb.rect.y as u64 + n.lb.rect.height as u64)
        .max()
        .unwrap_or(0);
    let height = u32::try_from(bottom + INSET as u64).map_err(|_| too_tall("content"))?;
    Ok(Layout { width, height: height.max(1), nodes: flow.nodes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_places_title_and_paragraphs() {
        let html = r#"<div id="invoice"><h1>Invoice</h1><p>Hello world</p><p>More text</p></div>"#;
        let layout = layout_fragment(html, 200).unwrap();
        assert_eq!(layout.nodes.len(), 3);
        assert_eq!(layout.nodes[0].elem_type, ElementType::Title);
        assert_eq!(layout.nodes[0].scale, 2);
        assert_eq!(layout.nodes[1].elem_type, ElementType::Paragraph);
        assert!(layout.nodes[1].lb.rect.y > layout.nodes[0].lb.rect.y);
        assert!(layout.nodes[1].lb.rect.width > 0);
    }

    #[test]
    fn natural_height_is_not_clipped() {
        let para = "<p>line item</p>".repeat(200);
        let layout = layout_fragment(&format!("<div>{}</div>", para), 400).unwrap();
        assert_eq!(layout.nodes.len(), 200);
        // each paragraph: one 8px line, 6px padding on both sides, 6px margin
        assert_eq!(layout.height, INSET + 200 * (8 + 12 + 6) - 6 + INSET);
    }

    #[test]
    fn wrap_splits_words_and_long_tokens() {
        assert_eq!(wrap_text("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap_text("   ", 4).is_empty());
    }

    #[test]
    fn table_rows_split_width_between_cells() {
        let html = r#"<table><tr><th>Item</th><th>Qty</th><th>Amount</th></tr>
            <tr><td>Design</td><td>2</td><td>$1,200.00</td></tr></table>"#;
        let layout = layout_fragment(html, 416).unwrap();
        assert_eq!(layout.nodes.len(), 2);
        match &layout.nodes[0].content {
            Content::Cells(cells) => {
                assert_eq!(cells.len(), 3);
                assert!(cells.iter().all(|c| c.header));
                let total: u32 = cells.iter().map(|c| c.rect.width).sum();
                assert_eq!(total, 400);
            }
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(layout.nodes[1].lb.rect.y, layout.nodes[0].lb.rect.y + layout.nodes[0].lb.rect.height as i32);
    }

    #[test]
    fn inherits_inline_color() {
        let html = r#"<div style="color: #ff0000"><section><p>Due</p><p style="color:blue">Paid</p></section></div>"#;
        let layout = layout_fragment(html, 200).unwrap();
        assert_eq!(layout.nodes[0].color, Rgba([255, 0, 0, 255]));
        assert_eq!(layout.nodes[1].color, Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn remote_images_are_unsupported() {
        let html = r#"<div><img src="https://cdn.example.com/logo.png"></div>"#;
        let err = layout_fragment(html, 200).unwrap_err();
        assert!(matches!(err, Error::RenderFailure(_)));
    }

    fn png_data_uri(w: u32, h: u32) -> String {
        use base64::Engine as _;
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", base64::engine::general_purpose::STANDARD.encode(&png))
    }

    fn texts(layout: &Layout) -> Vec<String> {
        layout
            .nodes
            .iter()
            .filter_map(|n| match &n.content {
                Content::Lines(lines) => Some(lines.join(" ")),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn oversized_image_attributes_are_render_failures() {
        let src = png_data_uri(2, 2);
        for (w, h) in [("10", "4294967295"), ("10", "99999999999"), ("100", "4000000")] {
            let html = format!(r#"<div><img src="{}" width="{}" height="{}"><p>Total</p></div>"#, src, w, h);
            let err = layout_fragment(&html, 200).unwrap_err();
            assert!(matches!(err, Error::RenderFailure(_)), "{}x{}: {:?}", w, h, err);
        }
    }

    #[test]
    fn stacked_boxes_past_the_coordinate_range_fail() {
        let src = png_data_uri(1, 1);
        // each image is just under the pixel budget; eleven of them pass i32::MAX
        let img = format!(r#"<img src="{}" width="1" height="199999999">"#, src);
        let html = format!("<div>{}</div>", img.repeat(11));
        assert!(matches!(layout_fragment(&html, 200), Err(Error::RenderFailure(_))));
    }

    #[test]
    fn image_within_budget_keeps_its_size() {
        let html = format!(r#"<div><img src="{}" width="40" height="20"></div>"#, png_data_uri(4, 2));
        let layout = layout_fragment(&html, 200).unwrap();
        assert_eq!(layout.nodes[0].lb.rect, Rect { x: 8, y: 8, width: 40, height: 20 });
        assert_eq!(layout.height, 8 + 20 + 8);
    }

    #[test]
    fn loose_text_beside_blocks_is_kept_in_order() {
        let html = r#"<div>Amount due: $4,250.50<p>Thanks</p>Paid by <b>wire</b> transfer<hr>Ref 7</div>"#;
        let layout = layout_fragment(html, 400).unwrap();
        assert_eq!(texts(&layout), vec!["Amount due: $4,250.50", "Thanks", "Paid by wire transfer", "Ref 7"]);
        assert!(layout.nodes.windows(2).all(|p| p[0].lb.rect.y < p[1].lb.rect.y));
        assert_eq!(layout.nodes[0].elem_type, ElementType::Paragraph);
    }

    #[test]
    fn whitespace_between_blocks_adds_nothing() {
        let html = "<div>\n  <p>One</p>\n  <!-- note -->\n  <p>Two</p>\n</div>";
        let layout = layout_fragment(html, 200).unwrap();
        assert_eq!(texts(&layout), vec!["One", "Two"]);
    }

    #[test]
    fn zero_width_is_rejected() {
        assert!(matches!(layout_fragment("<p>x</p>", 0), Err(Error::RenderFailure(_))));
    }
}
