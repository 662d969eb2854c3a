/// Display list built from a layout, in logical units.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use super::layout::{Content, Layout, GLYPH};

const HEADER_FILL: Rgba<u8> = Rgba([0xee, 0xee, 0xee, 255]);
const ROW_RULE: Rgba<u8> = Rgba([0xdd, 0xdd, 0xdd, 255]);

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: Rgba<u8>,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
        rgba: Rgba<u8>,
    },
    Image {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        image: Arc<RgbaImage>,
    },
}

fn lines(out: &mut Vec<PaintCommand>, x: i32, y: i32, lines: &[String], scale: u32, rgba: Rgba<u8>) {
    let line_h = (GLYPH * scale) as i32;
    for (i, line) in lines.iter().enumerate() {
        out.push(PaintCommand::Text {
            x,
            y: y + i as i32 * line_h,
            text: line.clone(),
            scale,
            rgba,
        });
    }
}

/// Build paint commands for a layout. The first command always fills the
/// whole region with the (opaque) background.
pub fn build_display_list(layout: &Layout, background: Rgba<u8>) -> Vec<PaintCommand> {
    let mut out = vec![PaintCommand::SolidRect {
        x: 0,
        y: 0,
        width: layout.width,
        height: layout.height,
        rgba: Rgba([background[0], background[1], background[2], 255]),
    }];

    for node in &layout.nodes {
        let r = &node.lb.rect;
        if let Some(bg) = node.background {
            out.push(PaintCommand::SolidRect { x: r.x, y: r.y, width: r.width, height: r.height, rgba: bg });
        }
        let pad = node.lb.box_model.padding as i32;
        match &node.content {
            Content::Lines(text) => lines(&mut out, r.x + pad, r.y + pad, text, node.scale, node.color),
            Content::Cells(cells) => {
                for cell in cells {
                    let c = &cell.rect;
                    if cell.header {
                        out.push(PaintCommand::SolidRect { x: c.x, y: c.y, width: c.width, height: c.height, rgba: HEADER_FILL });
                    }
                    lines(&mut out, c.x + pad, c.y + pad, &cell.lines, 1, node.color);
                }
                out.push(PaintCommand::SolidRect {
                    x: r.x,
                    y: r.y + r.height as i32 - 1,
                    width: r.width,
                    height: 1,
                    rgba: ROW_RULE,
                });
            }
            Content::Rule => out.push(PaintCommand::SolidRect {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                rgba: node.color,
            }),
            Content::Image(image) => out.push(PaintCommand::Image {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                image: Arc::clone(image),
            }),
        }
    }
    out
}
