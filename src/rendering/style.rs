/// Inline style helpers: only the handful of properties the block renderer honours.

use image::Rgba;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Parse a CSS color value (`#rgb`, `#rrggbb` or a few named colors).
///
/// The result is always opaque; alpha channels are not supported.
pub fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let v = value.trim().to_ascii_lowercase();
    if let Some(hex) = v.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expand = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let d = c.to_digit(16)? as u8;
                    out[i] = d * 17;
                }
                Some(Rgba([out[0], out[1], out[2], 255]))
            }
            6 => Some(Rgba([
                expand(&hex[0..2])?,
                expand(&hex[2..4])?,
                expand(&hex[4..6])?,
                255,
            ])),
            _ => None,
        };
    }
    let rgb = match v.as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "gray" | "grey" => (128, 128, 128),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "navy" => (0, 0, 128),
        _ => return None,
    };
    Some(Rgba([rgb.0, rgb.1, rgb.2, 255]))
}

/// Look up a single property in an inline `style` attribute.
pub fn style_property<'a>(style: &'a str, name: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (k, v) = decl.split_once(':')?;
        if k.trim().eq_ignore_ascii_case(name) {
            Some(v.trim())
        } else {
            None
        }
    })
}

/// Text color declared by an inline style, if any.
pub fn color_of(style: Option<&str>) -> Option<Rgba<u8>> {
    style_property(style?, "color").and_then(parse_color)
}

/// Background fill declared by an inline style, if any.
///
/// `background` shorthand is accepted when its first token is a color.
pub fn background_of(style: Option<&str>) -> Option<Rgba<u8>> {
    let style = style?;
    style_property(style, "background-color")
        .and_then(parse_color)
        .or_else(|| {
            style_property(style, "background")
                .and_then(|v| v.split_whitespace().next())
                .and_then(parse_color)
        })
}

/// Format a color as `#rrggbb`.
pub fn to_hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}
