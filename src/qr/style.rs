use image::Rgba;

use crate::models::PixelShape;

pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";

/// Rendering style with colors resolved to raw pixels. Invalid color
/// strings are substituted with the defaults; style problems never reject
/// a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrStyle {
    pub dark: Rgba<u8>,
    pub light: Rgba<u8>,
    pub shape: PixelShape,
}

impl Default for QrStyle {
    fn default() -> Self {
        QrStyle {
            dark: Rgba([0, 0, 0, 255]),
            light: Rgba([255, 255, 255, 255]),
            shape: PixelShape::Square,
        }
    }
}

impl QrStyle {
    pub fn resolve(color: &str, background_color: &str, shape: PixelShape) -> Self {
        let defaults = QrStyle::default();
        QrStyle {
            dark: parse_hex_color(color).unwrap_or(defaults.dark),
            light: parse_hex_color(background_color).unwrap_or(defaults.light),
            shape,
        }
    }
}

/// Parse a 3- or 6-digit hex color, with or without the leading `#`.
/// Anything else is `None`.
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match digits.len() {
        3 => {
            let mut channels = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let nibble = c.to_digit(16)? as u8;
                channels[i] = nibble << 4 | nibble;
            }
            Some(Rgba([channels[0], channels[1], channels[2], 255]))
        }
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some(Rgba([r, g, b, 255]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        assert_eq!(parse_hex_color("#1A2B3C"), Some(Rgba([0x1A, 0x2B, 0x3C, 255])));
        assert_eq!(parse_hex_color("ff0000"), Some(Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn parses_three_digit_hex() {
        assert_eq!(parse_hex_color("#f0a"), Some(Rgba([0xFF, 0x00, 0xAA, 255])));
        assert_eq!(parse_hex_color("abc"), Some(Rgba([0xAA, 0xBB, 0xCC, 255])));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(parse_hex_color(""), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
        assert_eq!(parse_hex_color("#1234567"), None);
    }

    #[test]
    fn resolve_keeps_valid_colors_verbatim() {
        let style = QrStyle::resolve("#336699", "#FFEEDD", PixelShape::Round);
        assert_eq!(style.dark, Rgba([0x33, 0x66, 0x99, 255]));
        assert_eq!(style.light, Rgba([0xFF, 0xEE, 0xDD, 255]));
        assert_eq!(style.shape, PixelShape::Round);
    }

    #[test]
    fn resolve_substitutes_defaults_for_invalid_colors() {
        let style = QrStyle::resolve("chartreuse", "#12", PixelShape::Square);
        assert_eq!(style.dark, Rgba([0, 0, 0, 255]));
        assert_eq!(style.light, Rgba([255, 255, 255, 255]));
    }
}
